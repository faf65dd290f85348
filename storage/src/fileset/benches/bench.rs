use criterion::criterion_main;

mod find;
mod utils;
mod write;

criterion_main!(write::benches, find::benches, open::benches);
