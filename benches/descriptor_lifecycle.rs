//! Benchmark: descriptor and workspace create/destroy against the mock library.

use std::sync::Arc;

use anvil_dnn::dnn::{
    ConvolutionConfig, ConvolutionDescriptor, DnnContext, FilterDescriptor, ForwardWorkspace, MockLibrary,
    TensorDescriptor, TensorViewDescriptor,
};
use anvil_dnn::memory::HostAllocator;
use anvil_dnn::tensor::{Dimension, Matrix, Precision};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn context() -> Arc<DnnContext> {
    DnnContext::new(Arc::new(MockLibrary::new()), Arc::new(HostAllocator::new())).unwrap()
}

fn bench_tensor_descriptors(c: &mut Criterion) {
    let context = context();
    let mut matrix = Matrix::zeros(context.allocator(), Dimension::from([8, 3, 32, 32]), Precision::Single).unwrap();

    c.bench_function("tensor_descriptor_new", |b| {
        b.iter(|| black_box(TensorDescriptor::new(&context, &matrix).unwrap()))
    });

    c.bench_function("tensor_view_new", |b| {
        b.iter(|| {
            let view = TensorViewDescriptor::new(&context, &mut matrix).unwrap();
            black_box(view.descriptor());
        })
    });

    c.bench_function("tensor_descriptor_zeros", |b| {
        b.iter(|| black_box(TensorDescriptor::zeros(&context, &Dimension::from([4, 16, 8, 8]), Precision::Half).unwrap()))
    });
}

fn bench_forward_workspace(c: &mut Criterion) {
    let context = context();
    let source = TensorDescriptor::zeros(&context, &Dimension::from([8, 3, 32, 32]), Precision::Single).unwrap();
    let weights = Matrix::zeros(context.allocator(), Dimension::from([16, 3, 3, 3]), Precision::Single).unwrap();
    let filter = FilterDescriptor::new(&context, &weights).unwrap();
    let convolution = ConvolutionDescriptor::new(&context, ConvolutionConfig::new_2d([0, 0], [1, 1])).unwrap();
    let output = convolution.output_dimension(&source, &filter).unwrap();
    let result = TensorDescriptor::zeros(&context, &output, Precision::Single).unwrap();

    c.bench_function("forward_workspace_new", |b| {
        b.iter(|| black_box(ForwardWorkspace::new(&context, &source, &filter, &convolution, &result).unwrap()))
    });
}

criterion_group!(benches, bench_tensor_descriptors, bench_forward_workspace);
criterion_main!(benches);
