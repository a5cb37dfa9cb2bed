use std::path::Path;

use shortlist_rs::{HandlerConfig, Mode, ShortlistMethod};

#[allow(dead_code)]
pub const NUM_LABELS: usize = 2_000;
#[allow(dead_code)]
pub const WIDTH: usize = 16;

#[allow(dead_code)]
pub fn handler_config(
    method: ShortlistMethod,
    dir: &Path,
    mode: Mode,
    in_memory: bool,
) -> HandlerConfig {
    HandlerConfig {
        model_dir: dir.to_path_buf(),
        mode,
        in_memory,
        min_nneg: 4,
        corruption: 6,
        seed: Some(42),
        ..HandlerConfig::new(method, NUM_LABELS, WIDTH)
    }
}
