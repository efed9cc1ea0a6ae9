#![deny(missing_docs)]

//! # Contract Parsing Module
//!
//! - **document**: JSON/YAML loading and format sniffing.
//! - **refs**: Same-document `$ref` inlining.
//! - **models**: Intermediate Representation definitions.
//! - **parser**: Path/operation walking into `EndpointSpec` records.

pub mod document;
pub mod models;
pub mod parser;
pub(crate) mod refs;

pub use document::{load_document, ContractFormat};
pub use models::{
    Contract, EndpointId, EndpointSpec, ParamLocation, Parameter, RequestBody, SchemeKind,
    SecurityRequirement,
};
pub use parser::{parse_contract, parse_document};
