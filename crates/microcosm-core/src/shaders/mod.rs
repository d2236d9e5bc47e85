//! WGSL kernel sources. Every kernel is compiled as the shared prelude
//! (packed-format accessors, PCG, grid indexing) followed by its body, so
//! the layout constants exist in exactly one place per side of the GPU
//! boundary.

const PRELUDE: &str = include_str!("prelude.wgsl");

fn with_prelude(body: &str) -> String {
    let mut source = String::with_capacity(PRELUDE.len() + body.len() + 1);
    source.push_str(PRELUDE);
    source.push('\n');
    source.push_str(body);
    source
}

pub fn apply_commands() -> String {
    with_prelude(include_str!("apply_commands.wgsl"))
}

pub fn temperature_diffusion() -> String {
    with_prelude(include_str!("temperature_diffusion.wgsl"))
}

pub fn intent_declaration() -> String {
    with_prelude(include_str!("intent_declaration.wgsl"))
}

pub fn resolve_and_execute() -> String {
    with_prelude(include_str!("resolve_and_execute.wgsl"))
}

pub fn stats_reduction() -> String {
    with_prelude(include_str!("stats_reduction.wgsl"))
}

pub fn pick() -> String {
    with_prelude(include_str!("pick.wgsl"))
}

pub fn render_blit() -> String {
    with_prelude(include_str!("render_blit.wgsl"))
}
