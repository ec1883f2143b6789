//! Core engine implementation
//!
//! [`Engine`] owns the window, the Vulkan backend and the scene, and drives
//! the frame orchestrator from the main loop.

use glfw::{Action, Key, WindowEvent};
use thiserror::Error;

use crate::config::ConfigError;
use crate::core::config::EngineConfig;
use crate::foundation::time::Timer;
use crate::render::backend::{BackendError, RenderBackend};
use crate::render::backends::vulkan::{VulkanBackend, Window, WindowError};
use crate::render::frame::{FrameError, FrameOrchestrator, FrameOutcome, FrameSettings};
use crate::scene::{Camera, Light, MovementInput, SceneGraph};

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Window creation failed
    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    /// Renderer setup or teardown failed
    #[error("Renderer error: {0}")]
    Backend(#[from] BackendError),

    /// Preparing the scene for rendering failed
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
}

/// Main engine struct
///
/// Fields drop in declaration order, so the backend releases its GPU
/// objects and surface before the window is destroyed.
pub struct Engine {
    scene: SceneGraph,
    camera: Camera,
    light: Light,
    orchestrator: FrameOrchestrator,
    timer: Timer,
    cursor: Option<(f64, f64)>,
    backend: VulkanBackend,
    window: Window,
}

impl Engine {
    /// Open the window and bring up the renderer
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        log::info!("Initializing engine...");

        let window = Window::new(&config.window)?;
        let backend = VulkanBackend::new(&window, config)?;
        let orchestrator = FrameOrchestrator::new(FrameSettings::from(config), backend.frame_slot_count());

        Ok(Self {
            scene: SceneGraph::new(),
            camera: Camera::from_config(&config.camera),
            light: Light::from_config(&config.lighting, &config.shadow),
            orchestrator,
            timer: Timer::new(),
            cursor: None,
            backend,
            window,
        })
    }

    /// Scene rendered every frame
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Mutable access to the scene
    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    /// Viewing camera
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Scene light
    pub fn light_mut(&mut self) -> &mut Light {
        &mut self.light
    }

    /// Upload the scene's meshes and textures
    pub fn prepare(&mut self) -> Result<(), EngineError> {
        let stats = self.orchestrator.prepare(&mut self.backend, &self.scene)?;
        log::info!(
            "Prepared {} nodes ({} meshes, {} textures)",
            self.scene.len(),
            stats.meshes,
            stats.textures
        );
        Ok(())
    }

    /// Run the main loop until the window closes or Escape is pressed
    pub fn run(&mut self) -> Result<(), EngineError> {
        self.prepare()?;
        log::info!("Starting main loop...");
        self.timer = Timer::new();

        while !self.window.should_close() {
            self.window.poll_events();
            self.handle_events();
            if self.window.should_close() {
                break;
            }

            self.timer.update();
            let input = MovementInput {
                forward: self.window.is_key_down(Key::W),
                backward: self.window.is_key_down(Key::S),
                left: self.window.is_key_down(Key::A),
                right: self.window.is_key_down(Key::D),
            };
            self.camera.update_movement(input, self.timer.delta_time());

            let (width, height) = self.window.framebuffer_size();
            if width == 0 || height == 0 {
                continue;
            }

            match self
                .orchestrator
                .render_frame(&mut self.backend, &self.scene, &self.camera, &self.light)
            {
                Ok(FrameOutcome::Presented { .. }) => {}
                Ok(FrameOutcome::Skipped) => log::debug!("Frame skipped"),
                Err(e) => log::error!("Dropped frame: {}", e),
            }
        }

        self.backend.wait_device_idle()?;
        log::info!(
            "Main loop finished after {} frames ({:.1} fps average)",
            self.timer.frame_count(),
            self.timer.average_fps()
        );
        Ok(())
    }

    fn handle_events(&mut self) {
        let events: Vec<WindowEvent> = self.window.flush_events().map(|(_, event)| event).collect();

        for event in events {
            match event {
                WindowEvent::Key(Key::Escape, _, Action::Press, _) | WindowEvent::Close => {
                    self.window.set_should_close(true);
                }
                WindowEvent::FramebufferSize(width, height) => {
                    let width = u32::try_from(width).unwrap_or(0);
                    let height = u32::try_from(height).unwrap_or(0);
                    log::debug!("Framebuffer resized to {}x{}", width, height);
                    self.backend.set_framebuffer_size(width, height);
                }
                WindowEvent::CursorPos(x, y) => {
                    if let Some((last_x, last_y)) = self.cursor {
                        self.camera
                            .handle_mouse_motion((x - last_x) as f32, (y - last_y) as f32);
                    }
                    self.cursor = Some((x, y));
                }
                _ => {}
            }
        }
    }
}
