//! StackFlow Core
//!
//! Declarative description of a cloud network stack (VPC, subnet, routing,
//! security group, compute instance) as a typed resource graph.
//!
//! - [`parser`]: `stack.kdl` → [`Stack`]
//! - [`validate`]: structural checks and dependency order
//! - [`loader`]: project discovery + parse + boot script resolution

pub mod cidr;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod model;
pub mod parser;
pub mod templates;
pub mod validate;

// Re-exports
pub use cidr::Ipv4Cidr;
pub use discovery::{STACK_FILE, STACKFLOW_DIR, find_project_root, find_stack_file};
pub use error::{Result, StackError, ValidationIssue};
pub use loader::load_stack_from_root;
pub use model::*;
pub use parser::parse_kdl_string;
pub use validate::{DependencyOrder, dependency_order, validate_stack};
