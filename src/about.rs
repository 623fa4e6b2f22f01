pub const CONTIGUATOR_TOOLS_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (build ",
    env!("CONTIGUATOR_TOOLS_BUILD_N"),
    ")"
);

pub const CONTIGUATOR_TOOLS_ABOUT: &str =
    "Add CONTIGuator excluded contigs to PseudoContig.embl file";
