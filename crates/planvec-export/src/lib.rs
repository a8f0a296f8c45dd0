//! planvec-export: Pure format serializers (sans-IO)
//!
//! Converts scaled polylines into laser-cutter input formats.
//! Currently supports SVG sized in physical units.

pub mod svg;

pub use svg::{SvgMetadata, build_path_data, to_svg};
