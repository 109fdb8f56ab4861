use criterion::{black_box, criterion_group, criterion_main, Criterion};
use garage_sale::{api::product::product_api::render_products, core::product::demo_products};

fn render_benchmark(c: &mut Criterion) {
    let products = demo_products();
    c.bench_function("render_products", |b| {
        b.iter(|| render_products(black_box(&products)))
    });
}

criterion_group!(benches, render_benchmark);
criterion_main!(benches);
