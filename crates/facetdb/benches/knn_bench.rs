//! Benchmarks for key codecs and KNN search over the database-backed
//! inverted lists.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use facetdb::codec::{decode_varint_signed, encode_varint_signed};
use facetdb::{
    floats_to_bytes, IvfFlatIndex, IvfIndex, KMeansConfig, MemEngine, SecondaryIndex,
    SecondaryIndexIterator, TransactionDb, WideColumns,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn bench_varint(c: &mut Criterion) {
    c.bench_function("varint_signed_roundtrip", |b| {
        b.iter(|| {
            for value in -512i64..512 {
                let bytes = encode_varint_signed(black_box(value));
                black_box(decode_varint_signed(&bytes));
            }
        });
    });
}

fn bench_knn(c: &mut Criterion) {
    let dim = 8;
    let num_lists = 16;

    let mut rng = StdRng::seed_from_u64(42);
    let vectors: Vec<Vec<f32>> =
        (0..1024).map(|_| (0..dim).map(|_| rng.gen::<f32>()).collect()).collect();
    let refs: Vec<&[f32]> = vectors.iter().map(Vec::as_slice).collect();

    let index = IvfFlatIndex::train(dim, num_lists, &refs, &KMeansConfig::new().with_seed(42))
        .expect("train");
    let ivf = Arc::new(IvfIndex::new(index, "embedding"));

    let db = TransactionDb::open(MemEngine::new(), vec![ivf.clone() as Arc<dyn SecondaryIndex>]);
    let primary = db.create_column_family("primary").expect("create primary");
    let secondary = db.create_column_family("secondary").expect("create secondary");
    ivf.bind_column_families(primary, secondary).expect("bind");

    let mut txn = db.begin_transaction().expect("begin");
    for (i, vector) in vectors.iter().enumerate() {
        txn.put_entity(
            Some(primary),
            i.to_string().as_bytes(),
            WideColumns::from_pairs([(b"embedding".to_vec(), floats_to_bytes(vector))]),
            true,
        )
        .expect("put");
    }
    txn.commit().expect("commit");

    c.bench_function("find_knn_1024x8", |b| {
        let mut cursor =
            SecondaryIndexIterator::new(&*ivf, db.new_iterator(secondary).expect("iterator"));
        let target = floats_to_bytes(&vectors[0]);
        b.iter(|| {
            black_box(ivf.find_knn(&mut cursor, &target, 8, num_lists).expect("find_knn"));
        });
    });
}

criterion_group!(benches, bench_varint, bench_knn);
criterion_main!(benches);
