//! モデル定義
//!
//! StackFlowで使用されるデータモデルを定義します。

mod resource;
mod stack;

// Re-exports
pub use resource::*;
pub use stack::*;
