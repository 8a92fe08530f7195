#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Builds the implementation namespace by running implementation cells in
//! document order against one shared namespace.

use thiserror::Error;

use crate::{
    constants::{CELL_ORIGIN, IMPLEMENTATION_MODULE},
    notebook::Cell,
    runtime::{Namespace, Runtime, RuntimeError},
};

/// Building the implementation namespace failed.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The runtime could not provide a namespace to start from.
    #[error("Could not create the implementation namespace")]
    Create(#[source] RuntimeError),

    /// An implementation cell raised; later cells were not run.
    #[error("Implementation cell {cell} failed")]
    Cell {
        /// Document index of the failing cell.
        cell:   usize,
        /// What the runtime reported.
        #[source]
        source: RuntimeError,
    },
}

/// Runs `cells` in order in a fresh namespace seeded as the `student` module.
///
/// All or nothing: the first cell that raises stops the phase, the partial
/// namespace is released, and no namespace is returned.
pub async fn build_namespace<R: Runtime>(
    runtime: &mut R,
    cells: &[&Cell],
) -> Result<Namespace<R::Value>, SandboxError> {
    let mut namespace = runtime
        .create(IMPLEMENTATION_MODULE)
        .await
        .map_err(SandboxError::Create)?;

    for cell in cells {
        tracing::debug!("Executing implementation cell {}", cell.index());
        if let Err(source) = runtime
            .execute(&mut namespace, cell.source(), CELL_ORIGIN)
            .await
        {
            tracing::warn!("Implementation cell {} failed: {}", cell.index(), source);
            if let Err(err) = runtime.release(namespace).await {
                tracing::debug!("Could not release partial namespace: {err}");
            }
            return Err(SandboxError::Cell {
                cell: cell.index(),
                source,
            });
        }
    }

    tracing::debug!(
        "Implementation namespace {} holds {} names",
        namespace.id(),
        namespace.len()
    );
    Ok(namespace)
}
