//! Headset session: renders both eyes into the runtime's swap chain and
//! submits one layer per frame.
//!
//! The session owns the SDK handles and an eye framebuffer; it never owns
//! vertex data. Drawing between `begin_frame` and `end_frame` goes through
//! the regular batching API with stereo enabled.

use anyhow::{Context as _, Result};

use crate::backend::GpuBackend;
use crate::context::Rlgl;
use crate::math::Vec3;

use super::convert::{projection_from_fov, view_from_pose};
use super::device::{
    Eye, EyeRenderDesc, HmdDesc, LayerEyeFov, MirrorDesc, MirrorHandle, Pose, SessionHandle, SessionStatus,
    SwapChainDesc, SwapChainHandle, TextureSize, ViewScaleDesc, VrDevice,
};
use super::stereo::StereoView;

/// Objects created during setup, released in reverse on failure.
#[derive(Default)]
struct Partial {
    swap_chain: Option<SwapChainHandle>,
    mirror: Option<MirrorHandle>,
    framebuffer: u32,
    depth: u32,
}

impl Partial {
    fn release<D: VrDevice, B: GpuBackend>(self, device: &mut D, rl: &mut Rlgl<B>, session: SessionHandle) {
        rl.backend.delete_framebuffer(self.framebuffer);
        rl.backend.delete_renderbuffer(self.depth);
        if let Some(mirror) = self.mirror {
            device.destroy_mirror_texture(session, mirror);
        }
        if let Some(chain) = self.swap_chain {
            device.destroy_swap_chain(session, chain);
        }
    }
}

struct Built {
    hmd: HmdDesc,
    eye_render_desc: [EyeRenderDesc; 2],
    render_size: TextureSize,
    swap_chain: SwapChainHandle,
    swap_chain_length: usize,
    mirror: MirrorHandle,
}

pub struct VrSession<D: VrDevice> {
    device: D,
    session: SessionHandle,
    hmd: HmdDesc,
    eye_render_desc: [EyeRenderDesc; 2],
    swap_chain: SwapChainHandle,
    swap_chain_length: usize,
    mirror: MirrorHandle,
    framebuffer: u32,
    depth: u32,
    render_size: TextureSize,
    layer: LayerEyeFov,
    frame_index: u64,
    in_frame: bool,
}

impl<D: VrDevice> VrSession<D> {
    /// Initializes the runtime and creates everything a frame needs.
    ///
    /// On failure every object created so far is destroyed, the session is
    /// closed and the runtime shut down.
    pub fn new<B: GpuBackend>(mut device: D, rl: &mut Rlgl<B>, mirror_size: TextureSize) -> Result<Self> {
        device.initialize().context("failed to initialize VR runtime")?;

        let session = match device.create_session() {
            Ok(s) => s,
            Err(e) => {
                device.shutdown();
                return Err(e).context("failed to create VR session");
            }
        };

        let mut partial = Partial::default();
        let built = match Self::setup(&mut device, rl, session, mirror_size, &mut partial) {
            Ok(built) => built,
            Err(e) => {
                log::error!("VR: session setup failed: {e:#}");
                partial.release(&mut device, rl, session);
                device.destroy_session(session);
                device.shutdown();
                return Err(e);
            }
        };

        let Built {
            hmd,
            eye_render_desc,
            render_size,
            swap_chain,
            swap_chain_length,
            mirror,
        } = built;
        let half = render_size.width as i32 / 2;
        let h = render_size.height as i32;
        let layer = LayerEyeFov {
            swap_chain,
            viewports: [[0, 0, half, h], [half, 0, half, h]],
            fov: hmd.default_eye_fov,
            render_pose: [Pose::default(); 2],
            sensor_sample_time: 0.0,
        };

        if let Err(e) = device.recenter_tracking_origin(session) {
            log::warn!("VR: initial recenter failed: {e}");
        }
        log::info!(
            "VR: session ready (HMD {}x{}, render target {}x{}, {swap_chain_length} swap-chain buffers)",
            hmd.resolution.width,
            hmd.resolution.height,
            render_size.width,
            render_size.height
        );

        Ok(Self {
            device,
            session,
            hmd,
            eye_render_desc,
            swap_chain,
            swap_chain_length,
            mirror,
            framebuffer: partial.framebuffer,
            depth: partial.depth,
            render_size,
            layer,
            frame_index: 0,
            in_frame: false,
        })
    }

    fn setup<B: GpuBackend>(
        device: &mut D,
        rl: &mut Rlgl<B>,
        session: SessionHandle,
        mirror_size: TextureSize,
        partial: &mut Partial,
    ) -> Result<Built> {
        let hmd = device.hmd_desc(session).context("failed to query HMD description")?;

        let mut sizes = [TextureSize::default(); 2];
        for eye in Eye::BOTH {
            sizes[eye.index()] = device
                .fov_texture_size(session, eye, hmd.default_eye_fov[eye.index()], 1.0)
                .with_context(|| format!("failed to query {eye:?} eye texture size"))?;
        }
        let render_size = TextureSize {
            width: sizes[0].width + sizes[1].width,
            height: sizes[0].height.max(sizes[1].height),
        };
        anyhow::ensure!(render_size.width > 0 && render_size.height > 0, "runtime reported an empty eye texture size");

        let swap_chain = device
            .create_swap_chain(session, &SwapChainDesc { size: render_size })
            .context("failed to create swap chain")?;
        partial.swap_chain = Some(swap_chain);
        let swap_chain_length = device
            .swap_chain_length(session, swap_chain)
            .context("failed to query swap chain length")?;

        partial.framebuffer = rl
            .backend
            .create_framebuffer()
            .context("failed to create eye framebuffer")?;
        partial.depth = rl
            .backend
            .create_depth_renderbuffer(render_size.width, render_size.height)
            .context("failed to create eye depth buffer")?;

        let mirror = device
            .create_mirror_texture(session, &MirrorDesc { size: mirror_size })
            .context("failed to create mirror texture")?;
        partial.mirror = Some(mirror);

        let mut eye_render_desc = [EyeRenderDesc::default(); 2];
        for eye in Eye::BOTH {
            eye_render_desc[eye.index()] = device
                .render_desc(session, eye, hmd.default_eye_fov[eye.index()])
                .with_context(|| format!("failed to query {eye:?} eye render description"))?;
        }

        Ok(Built {
            hmd,
            eye_render_desc,
            render_size,
            swap_chain,
            swap_chain_length,
            mirror,
        })
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[inline]
    pub fn hmd(&self) -> &HmdDesc {
        &self.hmd
    }

    #[inline]
    pub fn render_size(&self) -> TextureSize {
        self.render_size
    }

    #[inline]
    pub fn swap_chain_length(&self) -> usize {
        self.swap_chain_length
    }

    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Poses used for the frame in flight (or the last one).
    #[inline]
    pub fn eye_poses(&self) -> [Pose; 2] {
        self.layer.render_pose
    }

    fn eye_offsets(&self) -> [Vec3; 2] {
        self.eye_render_desc.map(|d| d.hmd_to_eye_offset)
    }

    /// Predicts eye poses, binds the current swap-chain texture and enables
    /// stereo. Returns `false` if no texture could be acquired; nothing is
    /// bound then and `end_frame` is a no-op.
    pub fn begin_frame<B: GpuBackend>(&mut self, rl: &mut Rlgl<B>) -> bool {
        if self.in_frame {
            log::warn!("VR: begin_frame called twice without end_frame");
            return true;
        }

        let offsets = self.eye_offsets();
        match self.device.eye_poses(self.session, self.frame_index, true, offsets) {
            Ok((poses, sample_time)) => {
                self.layer.render_pose = poses;
                self.layer.sensor_sample_time = sample_time;
            }
            Err(e) => log::warn!("VR: eye pose query failed ({e}), reusing previous poses"),
        }

        let texture = self
            .device
            .swap_chain_current_index(self.session, self.swap_chain)
            .and_then(|i| self.device.swap_chain_buffer(self.session, self.swap_chain, i));
        let texture = match texture {
            Ok(t) => t,
            Err(e) => {
                log::warn!("VR: no swap-chain texture for frame {}: {e}", self.frame_index);
                return false;
            }
        };

        let (w, h) = (self.render_size.width as i32, self.render_size.height as i32);
        rl.backend.bind_framebuffer(self.framebuffer);
        rl.backend.attach_color_texture(self.framebuffer, texture);
        rl.backend.attach_depth_renderbuffer(self.framebuffer, self.depth);
        rl.backend.viewport(0, 0, w, h);
        rl.backend.clear(true, true);

        let near = rl.config.cull_distance_near;
        let far = rl.config.cull_distance_far;
        let view = StereoView {
            projection: self.layer.fov.map(|fov| projection_from_fov(&fov, near, far)),
            view: self.layer.render_pose.map(|pose| view_from_pose(&pose)),
            viewports: self.layer.viewports,
            full_viewport: [0, 0, w, h],
        };
        rl.enable_stereo(view);
        self.in_frame = true;
        true
    }

    /// Flushes both eyes, commits the swap chain and submits the layer.
    pub fn end_frame<B: GpuBackend>(&mut self, rl: &mut Rlgl<B>) {
        if !std::mem::take(&mut self.in_frame) {
            return;
        }
        rl.draw();
        rl.disable_stereo();

        rl.backend.attach_color_texture(self.framebuffer, 0);
        rl.backend.attach_depth_renderbuffer(self.framebuffer, 0);
        rl.backend.bind_framebuffer(0);

        if let Err(e) = self.device.commit_swap_chain(self.session, self.swap_chain) {
            log::warn!("VR: swap chain commit failed: {e}");
        }
        let view_scale = ViewScaleDesc {
            hmd_to_eye_offset: self.eye_offsets(),
            world_scale_in_meters: 1.0,
        };
        if let Err(e) = self
            .device
            .submit_frame(self.session, self.frame_index, &view_scale, &[self.layer])
        {
            log::warn!("VR: frame {} submission failed: {e}", self.frame_index);
        }
        self.frame_index += 1;

        let (sw, sh) = rl.screen_size();
        rl.backend.viewport(0, 0, sw as i32, sh as i32);
    }

    /// Session status; recenters tracking when the runtime asks for it.
    pub fn poll_status(&mut self) -> SessionStatus {
        let status = match self.device.session_status(self.session) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("VR: session status query failed: {e}");
                return SessionStatus::default();
            }
        };
        if status.should_recenter {
            match self.device.recenter_tracking_origin(self.session) {
                Ok(()) => log::info!("VR: tracking origin recentered"),
                Err(e) => log::warn!("VR: recenter failed: {e}"),
            }
        }
        status
    }

    /// GL texture holding the compositor's mirror image, `0` if unavailable.
    pub fn mirror_texture(&mut self) -> u32 {
        match self.device.mirror_texture_buffer(self.session, self.mirror) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("VR: mirror texture unavailable: {e}");
                0
            }
        }
    }

    /// Releases the GL objects and SDK handles and shuts the runtime down.
    /// Returns the device.
    pub fn close<B: GpuBackend>(mut self, rl: &mut Rlgl<B>) -> D {
        if self.in_frame {
            self.end_frame(rl);
        }
        rl.backend.delete_framebuffer(self.framebuffer);
        rl.backend.delete_renderbuffer(self.depth);
        self.device.destroy_swap_chain(self.session, self.swap_chain);
        self.device.destroy_mirror_texture(self.session, self.mirror);
        self.device.destroy_session(self.session);
        self.device.shutdown();
        log::info!("VR: session closed after {} frames", self.frame_index);
        self.device
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::backend::recording::{Command, RecordingBackend};
    use crate::batch::DrawMode;
    use crate::context::tests::context;
    use crate::math::{Mat4, Quat};
    use crate::vr::device::{FovPort, VrResult};

    type Log = Rc<RefCell<Vec<String>>>;

    /// Scripted runtime. Every call is logged by name; `fail` makes the
    /// named call return `VrResult(-1000)`.
    #[derive(Default)]
    struct MockDevice {
        log: Log,
        fail: Vec<&'static str>,
        status: SessionStatus,
        poses: [Pose; 2],
    }

    impl MockDevice {
        fn call(&mut self, name: &'static str) -> Result<(), VrResult> {
            self.log.borrow_mut().push(name.to_owned());
            if self.fail.contains(&name) { Err(VrResult(-1000)) } else { Ok(()) }
        }
    }

    const FOV: FovPort = FovPort {
        up_tan: 1.0,
        down_tan: 1.0,
        left_tan: 1.0,
        right_tan: 1.0,
    };

    impl VrDevice for MockDevice {
        fn initialize(&mut self) -> Result<(), VrResult> {
            self.call("initialize")
        }
        fn create_session(&mut self) -> Result<SessionHandle, VrResult> {
            self.call("create_session").map(|_| SessionHandle(7))
        }
        fn hmd_desc(&mut self, _: SessionHandle) -> Result<HmdDesc, VrResult> {
            self.call("hmd_desc").map(|_| HmdDesc {
                resolution: TextureSize { width: 2160, height: 1200 },
                default_eye_fov: [FOV; 2],
            })
        }
        fn render_desc(&mut self, _: SessionHandle, eye: Eye, fov: FovPort) -> Result<EyeRenderDesc, VrResult> {
            let x = if eye == Eye::Left { -0.032 } else { 0.032 };
            self.call("render_desc").map(|_| EyeRenderDesc {
                fov,
                hmd_to_eye_offset: Vec3::new(x, 0.0, 0.0),
            })
        }
        fn fov_texture_size(&mut self, _: SessionHandle, eye: Eye, _: FovPort, _: f32) -> Result<TextureSize, VrResult> {
            let height = if eye == Eye::Left { 1500 } else { 1520 };
            self.call("fov_texture_size").map(|_| TextureSize { width: 1300, height })
        }
        fn create_swap_chain(&mut self, _: SessionHandle, _: &SwapChainDesc) -> Result<SwapChainHandle, VrResult> {
            self.call("create_swap_chain").map(|_| SwapChainHandle(1))
        }
        fn swap_chain_length(&mut self, _: SessionHandle, _: SwapChainHandle) -> Result<usize, VrResult> {
            self.call("swap_chain_length").map(|_| 3)
        }
        fn swap_chain_current_index(&mut self, _: SessionHandle, _: SwapChainHandle) -> Result<usize, VrResult> {
            self.call("swap_chain_current_index").map(|_| 2)
        }
        fn swap_chain_buffer(&mut self, _: SessionHandle, _: SwapChainHandle, index: usize) -> Result<u32, VrResult> {
            self.call("swap_chain_buffer").map(|_| 900 + index as u32)
        }
        fn commit_swap_chain(&mut self, _: SessionHandle, _: SwapChainHandle) -> Result<(), VrResult> {
            self.call("commit_swap_chain")
        }
        fn destroy_swap_chain(&mut self, _: SessionHandle, _: SwapChainHandle) {
            let _ = self.call("destroy_swap_chain");
        }
        fn create_mirror_texture(&mut self, _: SessionHandle, _: &MirrorDesc) -> Result<MirrorHandle, VrResult> {
            self.call("create_mirror_texture").map(|_| MirrorHandle(2))
        }
        fn mirror_texture_buffer(&mut self, _: SessionHandle, _: MirrorHandle) -> Result<u32, VrResult> {
            self.call("mirror_texture_buffer").map(|_| 950)
        }
        fn destroy_mirror_texture(&mut self, _: SessionHandle, _: MirrorHandle) {
            let _ = self.call("destroy_mirror_texture");
        }
        fn eye_poses(&mut self, _: SessionHandle, _: u64, _: bool, _: [Vec3; 2]) -> Result<([Pose; 2], f64), VrResult> {
            let poses = self.poses;
            self.call("eye_poses").map(|_| (poses, 1.5))
        }
        fn submit_frame(&mut self, _: SessionHandle, index: u64, _: &ViewScaleDesc, layers: &[LayerEyeFov]) -> Result<(), VrResult> {
            assert_eq!(layers.len(), 1);
            self.log.borrow_mut().push(format!("frame {index}"));
            self.call("submit_frame")
        }
        fn recenter_tracking_origin(&mut self, _: SessionHandle) -> Result<(), VrResult> {
            self.call("recenter_tracking_origin")
        }
        fn session_status(&mut self, _: SessionHandle) -> Result<SessionStatus, VrResult> {
            let status = self.status;
            self.call("session_status").map(|_| status)
        }
        fn destroy_session(&mut self, _: SessionHandle) {
            let _ = self.call("destroy_session");
        }
        fn shutdown(&mut self) {
            let _ = self.call("shutdown");
        }
    }

    fn mock(fail: &[&'static str]) -> (MockDevice, Log) {
        let log = Log::default();
        let device = MockDevice {
            log: log.clone(),
            fail: fail.to_vec(),
            ..Default::default()
        };
        (device, log)
    }

    fn calls(log: &Log) -> Vec<String> {
        log.borrow().clone()
    }

    const MIRROR: TextureSize = TextureSize { width: 1280, height: 720 };

    // ── setup ─────────────────────────────────────────────────────────────

    #[test]
    fn setup_sizes_target_from_both_eyes() {
        let mut rl = context();
        let (device, log) = mock(&[]);
        let session = VrSession::new(device, &mut rl, MIRROR).unwrap();

        assert_eq!(session.render_size(), TextureSize { width: 2600, height: 1520 });
        assert_eq!(session.swap_chain_length(), 3);
        assert_eq!(rl.backend().live_framebuffers(), 1);
        assert_eq!(rl.backend().live_renderbuffers(), 1);
        assert_eq!(calls(&log).last().map(String::as_str), Some("recenter_tracking_origin"));
    }

    #[test]
    fn failed_initialize_touches_nothing_else() {
        let mut rl = context();
        let (device, log) = mock(&["initialize"]);
        assert!(VrSession::new(device, &mut rl, MIRROR).is_err());
        assert_eq!(calls(&log), vec!["initialize"]);
    }

    #[test]
    fn failed_session_creation_shuts_down() {
        let mut rl = context();
        let (device, log) = mock(&["create_session"]);
        assert!(VrSession::new(device, &mut rl, MIRROR).is_err());
        assert_eq!(calls(&log), vec!["initialize", "create_session", "shutdown"]);
    }

    #[test]
    fn failure_after_session_releases_everything() {
        let mut rl = context();
        let (device, log) = mock(&["render_desc"]);
        let err = VrSession::new(device, &mut rl, MIRROR).err().unwrap();
        assert!(format!("{err:#}").contains("render description"));

        let all = calls(&log);
        assert_eq!(
            &all[all.len() - 4..],
            ["destroy_mirror_texture", "destroy_swap_chain", "destroy_session", "shutdown"]
        );
        assert_eq!(rl.backend().live_framebuffers(), 0);
        assert_eq!(rl.backend().live_renderbuffers(), 0);
    }

    // ── frame loop ────────────────────────────────────────────────────────

    #[test]
    fn frame_binds_swap_texture_and_submits() {
        let mut rl = context();
        rl.init_graphics_device(1280, 720);
        let (mut device, log) = mock(&[]);
        device.poses = [
            Pose {
                orientation: Quat::IDENTITY,
                position: Vec3::new(-0.032, 1.6, 0.0),
            },
            Pose {
                orientation: Quat::IDENTITY,
                position: Vec3::new(0.032, 1.6, 0.0),
            },
        ];
        let mut session = VrSession::new(device, &mut rl, MIRROR).unwrap();
        rl.backend_mut().clear_commands();

        assert!(session.begin_frame(&mut rl));
        assert!(rl.is_stereo());
        assert_eq!(session.eye_poses()[1].position.x, 0.032);
        let fbo = session.framebuffer;
        assert!(rl.backend().commands().contains(&Command::AttachColorTexture {
            framebuffer: fbo,
            texture: 902,
        }));

        rl.begin(DrawMode::Lines);
        rl.vertex3f(0.0, 1.6, -1.0);
        rl.vertex3f(0.1, 1.6, -1.0);
        rl.end();
        session.end_frame(&mut rl);

        assert!(!rl.is_stereo());
        assert_eq!(rl.backend().draws().len(), 2);
        assert_eq!(session.frame_index(), 1);
        let cmds = rl.backend().commands();
        assert_eq!(cmds.last(), Some(&Command::Viewport { x: 0, y: 0, width: 1280, height: 720 }));
        assert!(cmds.contains(&Command::BindFramebuffer(0)));

        let log = calls(&log);
        let commit = log.iter().position(|c| c == "commit_swap_chain").unwrap();
        let submit = log.iter().position(|c| c == "frame 0").unwrap();
        assert!(commit < submit);
    }

    #[test]
    fn stereo_view_follows_eye_poses() {
        let mut rl = context();
        let (mut device, _log) = mock(&[]);
        device.poses[0].position = Vec3::new(0.0, 1.6, 0.0);
        let mut session = VrSession::new(device, &mut rl, MIRROR).unwrap();
        session.begin_frame(&mut rl);

        let view = rl.stereo.unwrap();
        let (p, mv) = view.apply(Eye::Left, &Mat4::IDENTITY);
        assert!(mv.transform_point3(Vec3::new(0.0, 1.6, 0.0)).length() < 1e-6);
        assert_eq!(p, projection_from_fov(&FOV, 0.01, 1000.0));
        assert_eq!(view.viewports, [[0, 0, 1300, 1520], [1300, 0, 1300, 1520]]);
    }

    #[test]
    fn pose_failure_keeps_previous_poses() {
        let mut rl = context();
        let (mut device, _log) = mock(&[]);
        device.poses[0].position = Vec3::new(1.0, 2.0, 3.0);
        let mut session = VrSession::new(device, &mut rl, MIRROR).unwrap();
        session.begin_frame(&mut rl);
        session.end_frame(&mut rl);

        session.device.fail.push("eye_poses");
        assert!(session.begin_frame(&mut rl));
        assert_eq!(session.eye_poses()[0].position, Vec3::new(1.0, 2.0, 3.0));
        session.end_frame(&mut rl);
        assert_eq!(session.frame_index(), 2);
    }

    #[test]
    fn missing_swap_texture_skips_frame() {
        let mut rl = context();
        let (device, log) = mock(&["swap_chain_buffer"]);
        let mut session = VrSession::new(device, &mut rl, MIRROR).unwrap();
        assert!(!session.begin_frame(&mut rl));
        assert!(!rl.is_stereo());
        session.end_frame(&mut rl);
        assert_eq!(session.frame_index(), 0);
        assert!(!calls(&log).iter().any(|c| c == "submit_frame"));
    }

    // ── status ────────────────────────────────────────────────────────────

    #[test]
    fn recenter_requested_by_runtime() {
        let mut rl = context();
        let (mut device, log) = mock(&[]);
        device.status = SessionStatus {
            should_recenter: true,
            ..Default::default()
        };
        let mut session = VrSession::new(device, &mut rl, MIRROR).unwrap();
        log.borrow_mut().clear();

        assert!(session.poll_status().should_recenter);
        assert_eq!(calls(&log), vec!["session_status", "recenter_tracking_origin"]);
    }

    #[test]
    fn mirror_texture_zero_on_failure() {
        let mut rl = context();
        let (device, _log) = mock(&["mirror_texture_buffer"]);
        let mut session = VrSession::new(device, &mut rl, MIRROR).unwrap();
        assert_eq!(session.mirror_texture(), 0);
    }

    #[test]
    fn close_releases_in_order() {
        let mut rl = context();
        let (device, log) = mock(&[]);
        let session = VrSession::new(device, &mut rl, MIRROR).unwrap();
        log.borrow_mut().clear();

        let device = session.close(&mut rl);
        assert_eq!(
            calls(&device.log),
            vec!["destroy_swap_chain", "destroy_mirror_texture", "destroy_session", "shutdown"]
        );
        assert_eq!(rl.backend().live_framebuffers(), 0);
        assert_eq!(rl.backend().live_renderbuffers(), 0);
    }
}
