use ash::vk;
use std::path::Path;
use vulkan_learning::config::Config;
use winit::keyboard::KeyCode;

fn shipped_config() -> Config {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml");
    Config::load_from_path(path).unwrap()
}

#[test]
fn shipped_config_parses() {
    let config = shipped_config();
    assert_eq!(config.window.width, 1280);
    assert_eq!(config.window.height, 720);
    assert_eq!(config.present_mode(), vk::PresentModeKHR::MAILBOX);
    assert_eq!(config.frames_in_flight(), 2);
}

#[test]
fn shipped_keys_resolve() {
    let config = shipped_config();
    assert_eq!(config.controls.quit_key(), KeyCode::Escape);
    assert_eq!(config.controls.fullscreen_key(), KeyCode::F11);
}

#[test]
fn shipped_shader_paths_point_at_spirv() {
    let config = shipped_config();
    assert_eq!(
        config.assets.shader("textured.frag"),
        Path::new("shaders").join("textured.frag.spv")
    );
}

#[test]
fn missing_file_means_defaults() {
    let config = Config::load_from_path("does/not/exist.toml").unwrap();
    assert_eq!(config.graphics.clear_color, [0.0, 0.0, 0.0, 1.0]);
    assert!(config.debug.validation_layers);
}
