// src/sparql/mod.rs
// SPARQL 1.1 protocol adapter: query/update, buffered transactions,
// chunked quad insertion with retry

mod client;
mod results;
mod tx;

pub use client::{build_retract_updates, SparqlClient};
pub use results::{Binding, SparqlValue};
pub use tx::SparqlTx;
