//! Window management using GLFW
//!
//! Creates a resizable window without a client API and exposes what the
//! backend needs from it: instance extensions, a surface and the framebuffer
//! size. Input is drained by the engine through [`Window::flush_events`].

use ash::vk;
use thiserror::Error;

use crate::core::config::WindowConfig;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// GLFW reported an error
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window with its event queue
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Create a window sized and titled from `config`
    pub fn new(config: &WindowConfig) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        if !glfw.vulkan_supported() {
            return Err(WindowError::GlfwError("Vulkan is not supported".to_string()));
        }

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_framebuffer_size_polling(true);

        log::info!("Created {}x{} window \"{}\"", config.width, config.height, config.title);

        Ok(Self { glfw, window, events })
    }

    /// Whether the user asked to close the window
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request or cancel closing
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Process pending window system events
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
    }

    /// Drain events queued by the last poll
    pub fn flush_events(&self) -> glfw::FlushedMessages<'_, (f64, glfw::WindowEvent)> {
        glfw::flush_messages(&self.events)
    }

    /// Whether `key` is currently held down
    pub fn is_key_down(&self, key: glfw::Key) -> bool {
        matches!(self.window.get_key(key), glfw::Action::Press | glfw::Action::Repeat)
    }

    /// Current cursor position in screen coordinates
    pub fn cursor_pos(&self) -> (f64, f64) {
        self.window.get_cursor_pos()
    }

    /// Framebuffer size in pixels; zero while minimized
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    /// Vulkan instance extensions the window system requires
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Failed to get required extensions".to_string()))
    }

    /// Create a Vulkan surface for this window
    pub fn create_vulkan_surface(&self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!("Failed to create Vulkan surface: {:?}", result)))
        }
    }
}
