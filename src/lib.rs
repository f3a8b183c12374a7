//! Finite element assembly and sensitivity analysis for density-based topology optimization
//! of two-dimensional plane stress structures discretized with bilinear quadrilaterals.
pub mod assembly;
pub mod compliance;
pub mod connectivity;
pub mod dofs;
pub mod element;
pub mod error;
pub mod filter;
pub mod material;
pub mod mesh;
pub mod quadrature;
pub mod recovery;
pub mod sensitivity;
pub mod sparsity;
pub mod stress;

pub use error::Error;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
