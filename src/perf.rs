//! Batch mesh builds over a whole circuit.
//!
//! Sector and decoration meshes are independent: each reads its own
//! `ObjectData` and a shared `TextureList` immutably. With the `parallel`
//! feature the builds run on the Rayon pool; without it they run in order.
//! Either way the output has one entry per input, in input order.

use crate::error::FormatError;
use crate::mesh::{build_mesh, Aabb, Mesh};
use crate::records::circuit::Circuit;
use crate::records::{ObjectData, TextureList};

/// One independent build: a single object with its texture list and bounds.
struct BuildJob<'a> {
    object:   &'a ObjectData,
    textures: &'a TextureList,
    bounds:   Option<Aabb>,
}

fn run(jobs: &[BuildJob<'_>]) -> Result<Vec<Mesh>, FormatError> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        jobs.par_iter()
            .map(|j| build_mesh(&[j.object], Some(j.textures), j.bounds))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        jobs.iter()
            .map(|j| build_mesh(&[j.object], Some(j.textures), j.bounds))
            .collect()
    }
}

/// Every sector mesh, indexed like `circuit.sectors`.
pub fn build_sector_meshes(circuit: &Circuit) -> Result<Vec<Mesh>, FormatError> {
    let jobs: Vec<BuildJob<'_>> = circuit
        .sectors
        .iter()
        .map(|s| BuildJob { object: &s.object, textures: &circuit.textures, bounds: Some(s.render_bounds()) })
        .collect();
    run(&jobs)
}

/// Every decoration mesh, indexed like `circuit.environment.decorations`.
pub fn build_decoration_meshes(circuit: &Circuit) -> Result<Vec<Mesh>, FormatError> {
    let jobs: Vec<BuildJob<'_>> = circuit
        .environment
        .decorations
        .iter()
        .map(|d| BuildJob { object: &d.object, textures: &d.textures, bounds: None })
        .collect();
    run(&jobs)
}
