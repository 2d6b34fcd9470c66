use crate::error::Result;
use cootbridge::engine::materialize::ReturnType;
use cootbridge::engine::router::CommandRouter;
use cootbridge::engine::shims::{self, ShimKind};
use tracing::info;

pub fn run() -> Result<()> {
    CommandRouter::new()?;
    info!("Shim and materializer registries validated.");
    print!("{}", render());
    Ok(())
}

fn render() -> String {
    let mut out = String::from("Shims:\n");
    for shim in shims::all() {
        let kind = match shim.kind {
            ShimKind::Staging => "staging",
            ShimKind::Composite => "composite",
        };
        out.push_str(&format!(
            "  {:<44} {:<10} -> {}\n",
            shim.name, kind, shim.operation
        ));
    }
    out.push_str("\nResult types:\n");
    for return_type in ReturnType::ALL {
        let family = if return_type.is_geometry() {
            "geometry"
        } else {
            "record"
        };
        out.push_str(&format!("  {:<44} {}\n", return_type.as_str(), family));
    }
    out
}
