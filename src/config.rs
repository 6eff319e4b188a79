use std::path::PathBuf;

use crate::star::StarSpec;

/// Startup settings for the window, the star and the pipeline.
#[derive(Clone, Debug)]
pub struct Config {
    pub window_width: u32,
    pub window_height: u32,
    pub title: String,
    pub star: StarSpec,
    pub clear_color: [f32; 4],
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    /// Draw triangle edges only. Needs `fillModeNonSolid` on the device.
    pub wireframe: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_width: 800,
            window_height: 600,
            title: "Shaders".to_owned(),
            star: StarSpec {
                point_count: 4,
                outer_radius: 0.5,
                inner_radius: 0.15,
            },
            clear_color: [0.2, 0.3, 0.3, 1.0],
            vertex_shader: PathBuf::from("shaders/shader.vert"),
            fragment_shader: PathBuf::from("shaders/shader.frag"),
            wireframe: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_four_point_star() {
        let config = Config::default();
        assert_eq!((config.window_width, config.window_height), (800, 600));
        assert_eq!(config.title, "Shaders");
        assert_eq!(config.star.point_count, 4);
        assert_eq!(config.star.outer_radius, 0.5);
        assert_eq!(config.star.inner_radius, 0.15);
        assert!(config.wireframe);
    }

    #[test]
    fn default_star_is_valid() {
        assert!(Config::default().star.validate().is_ok());
    }
}
