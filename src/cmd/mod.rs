pub mod render;
pub mod validate;

use std::path::Path;

pub use render::{RenderArgs, handle_render};
pub use validate::{ValidateArgs, handle_validate};

/// `true` for a `.json` extension, `false` (YAML) otherwise — the same
/// sniffing rule both subcommands use to pick a decoder.
pub(crate) fn is_json_path(path: &Path) -> bool {
    path.extension().and_then(std::ffi::OsStr::to_str) == Some("json")
}
