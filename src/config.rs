#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub max_undo: usize,
    pub min_region_area: u64,
    pub snap_tolerance: f32,
    pub min_vertex_distance: f32,
    pub cut_width: u32,
    pub edit_snap_distance: f32,
    pub refine_padding: u32,
    pub refine_weights: [f32; 2],
    pub extreme_padding: u32,
    pub extreme_area_ratio: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_undo: 20,
            min_region_area: 10,
            snap_tolerance: 12.0,
            min_vertex_distance: 1.0,
            cut_width: 1,
            edit_snap_distance: 10.0,
            refine_padding: 30,
            refine_weights: [0.0, 1.0],
            extreme_padding: 100,
            extreme_area_ratio: 0.1,
        }
    }
}
