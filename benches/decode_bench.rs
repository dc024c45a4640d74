#[path = "../tests/common/mod.rs"]
mod common;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pdbf::mesh::build_mesh;
use pdbf::records::circuit::Circuit;
use pdbf::records::vehicle::{Condition, Vehicle};

fn bench_decrypt(c: &mut Criterion) {
    let raw = common::circuit();
    c.bench_function("decrypt_circuit", |b| b.iter(|| pdbf::decrypt(black_box(&raw)).unwrap()));
}

fn bench_parse(c: &mut Criterion) {
    let vehicle = common::vehicle();
    let circuit = common::circuit();

    c.bench_function("parse_vehicle", |b| b.iter(|| Vehicle::parse(black_box(&vehicle), false).unwrap()));
    c.bench_function("parse_circuit", |b| b.iter(|| Circuit::parse(black_box(&circuit), false).unwrap()));
}

fn bench_mesh(c: &mut Criterion) {
    let vehicle = Vehicle::parse(&common::vehicle(), false).unwrap();
    let circuit = Circuit::parse(&common::circuit(), false).unwrap();

    c.bench_function("chassis_mesh", |b| b.iter(|| vehicle.chassis_mesh(black_box(Condition::Good)).unwrap()));
    c.bench_function("sector_meshes", |b| b.iter(|| pdbf::perf::build_sector_meshes(black_box(&circuit)).unwrap()));
    c.bench_function("sector_mesh_single", |b| {
        let objects: Vec<_> = circuit.sectors.iter().map(|s| &s.object).collect();
        b.iter(|| build_mesh(black_box(&objects[..1]), Some(&circuit.textures), None).unwrap())
    });
}

criterion_group!(benches, bench_decrypt, bench_parse, bench_mesh);
criterion_main!(benches);
