//! Whole-image analysis
//!
//! Passes that run once over a decoded [`crate::usecode::UsecodeImage`]:
//! - Function id to name and kind resolution
//! - Class inheritance inference
//! - Global flag cross-referencing

pub mod class_hierarchy;
pub mod flag_usage;
pub mod function_index;

pub use class_hierarchy::ClassHierarchy;
pub use flag_usage::{FlagUsage, FlagUsageViews};
pub use function_index::{FunctionIndex, FunctionInfo, FunctionKind};

use crate::usecode::UsecodeImage;

/// Results of the analysis passes every renderer reads
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    pub index: FunctionIndex,
    pub hierarchy: ClassHierarchy,
    pub flags: FlagUsageViews,
}

impl ImageAnalysis {
    pub fn run(image: &UsecodeImage) -> Self {
        Self {
            index: FunctionIndex::build(&image.functions, image.symbols.as_ref()),
            hierarchy: ClassHierarchy::infer(image.classes()),
            flags: FlagUsageViews::collect(&image.functions, image.generation()),
        }
    }
}
