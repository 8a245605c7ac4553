//! End-to-end tests of the IVF vector index: entry layout, overwrite and
//! delete maintenance, KNN search including parity with the in-memory
//! reference lists, and input validation.

use std::sync::Arc;

use facetdb::codec::decode_varint_signed;
use facetdb::{
    ColumnFamilyId, IvfFlatIndex, IvfIndex, KMeansConfig, MemEngine, RawIterator, SecondaryIndex,
    SecondaryIndexIterator, TransactionDb, WideColumns,
};
use facetdb_vector::{floats_to_bytes, ArrayInvertedLists, FlatQuantizer};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const EMBEDDING_COLUMN: &[u8] = b"embedding";

fn random_vectors(rng: &mut StdRng, count: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..count).map(|_| (0..dim).map(|_| rng.gen::<f32>()).collect()).collect()
}

fn trained_index(dim: usize, num_lists: usize, training: &[Vec<f32>]) -> IvfFlatIndex {
    let refs: Vec<&[f32]> = training.iter().map(Vec::as_slice).collect();
    IvfFlatIndex::train(dim, num_lists, &refs, &KMeansConfig::new().with_seed(42))
        .expect("train index")
}

/// Quantizer with axis-aligned centroids so cluster assignment is obvious.
fn axis_index() -> IvfFlatIndex {
    IvfFlatIndex::new(
        FlatQuantizer::from_centroids(vec![
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0],
        ])
        .expect("quantizer"),
    )
}

fn open_db(index: IvfFlatIndex) -> (TransactionDb<MemEngine>, Arc<IvfIndex>, ColumnFamilyId, ColumnFamilyId)
{
    let ivf = Arc::new(IvfIndex::new(index, EMBEDDING_COLUMN));
    let db = TransactionDb::open(MemEngine::new(), vec![ivf.clone() as Arc<dyn SecondaryIndex>]);
    let primary = db.create_column_family("primary").expect("create primary");
    let secondary = db.create_column_family("secondary").expect("create secondary");
    ivf.bind_column_families(primary, secondary).expect("bind");
    (db, ivf, primary, secondary)
}

fn embedding_record(vector: &[f32]) -> WideColumns {
    WideColumns::from_pairs([(EMBEDDING_COLUMN.to_vec(), floats_to_bytes(vector))])
}

fn put_vectors(db: &TransactionDb<MemEngine>, cf: ColumnFamilyId, vectors: &[Vec<f32>]) {
    let mut txn = db.begin_transaction().expect("begin");
    for (i, vector) in vectors.iter().enumerate() {
        txn.put_entity(Some(cf), i.to_string().as_bytes(), embedding_record(vector), true)
            .expect("put");
    }
    txn.commit().expect("commit");
}

/// Decode a secondary entry key into (cluster id, primary key).
fn split_entry_key(key: &[u8]) -> (i64, Vec<u8>) {
    let (label, read) = decode_varint_signed(key).expect("varint prefix");
    (label, key[read..].to_vec())
}

#[test]
fn secondary_entries_hold_cluster_and_code() {
    // dim=4, num_lists=2, trained on 8 random vectors.
    let mut rng = StdRng::seed_from_u64(42);
    let training = random_vectors(&mut rng, 8, 4);
    let index = trained_index(4, 2, &training);
    let num_lists = index.num_lists() as i64;
    let (db, ivf, primary, secondary) = open_db(index);

    let vectors = random_vectors(&mut rng, 4, 4);
    put_vectors(&db, primary, &vectors);

    let mut it = db.new_iterator(secondary).expect("iterator");
    let mut num_found = 0usize;
    it.seek_to_first();
    while it.valid() {
        let (label, pk) = split_entry_key(it.key().expect("key"));
        assert!(label >= 0 && label < num_lists);

        let id: usize = String::from_utf8(pk).expect("utf8 pk").parse().expect("numeric pk");
        assert!(id < vectors.len());

        // Flat fine codes: the stored code is the original embedding.
        let value = it.value().expect("value");
        assert_eq!(value.len(), 16);
        assert_eq!(value, floats_to_bytes(&vectors[id]).as_slice());

        num_found += 1;
        it.next();
    }
    assert_eq!(num_found, vectors.len());

    // The primary records carry the rewritten (cluster id) column.
    let txn = db.begin_transaction().expect("begin");
    for (i, vector) in vectors.iter().enumerate() {
        let record = txn
            .get_entity(Some(primary), i.to_string().as_bytes())
            .expect("get")
            .expect("record");
        let column = record.get(EMBEDDING_COLUMN).expect("column");
        let (label, read) = decode_varint_signed(column).expect("varint");
        assert_eq!(read, column.len());
        assert_eq!(label, ivf.vector_index().assign(vector).expect("assign") as i64);
    }
}

#[test]
fn overwrite_keeps_exactly_one_entry_under_new_cluster() {
    let (db, ivf, primary, secondary) = open_db(axis_index());

    let mut txn = db.begin_transaction().expect("begin");
    txn.put_entity(Some(primary), b"7", embedding_record(&[1.0, 0.0, 0.0, 0.0]), true)
        .expect("put");
    txn.put_entity(Some(primary), b"7", embedding_record(&[0.0, 1.0, 0.0, 0.0]), true)
        .expect("overwrite");
    txn.commit().expect("commit");

    let mut it = db.new_iterator(secondary).expect("iterator");
    it.seek_to_first();
    assert!(it.valid());
    let (label, pk) = split_entry_key(it.key().expect("key"));
    assert_eq!(pk, b"7");
    assert_eq!(
        label,
        ivf.vector_index().assign(&[0.0, 1.0, 0.0, 0.0]).expect("assign") as i64
    );
    it.next();
    assert!(!it.valid(), "exactly one entry expected");
}

#[test]
fn delete_removes_primary_and_secondary() {
    let (db, _ivf, primary, secondary) = open_db(axis_index());

    let mut txn = db.begin_transaction().expect("begin");
    txn.put_entity(Some(primary), b"5", embedding_record(&[1.0, 0.1, 0.0, 0.0]), true)
        .expect("put");
    txn.commit().expect("commit");

    let mut txn = db.begin_transaction().expect("begin");
    txn.delete(Some(primary), b"5", true).expect("delete");
    txn.commit().expect("commit");

    let txn = db.begin_transaction().expect("begin");
    assert_eq!(txn.get_entity(Some(primary), b"5").expect("get"), None);

    let mut it = db.new_iterator(secondary).expect("iterator");
    it.seek_to_first();
    while it.valid() {
        let (_, pk) = split_entry_key(it.key().expect("key"));
        assert_ne!(pk, b"5");
        it.next();
    }
}

#[test]
fn knn_finds_self_first_with_monotonic_distances() {
    let mut rng = StdRng::seed_from_u64(42);
    let dim = 8;
    let num_lists = 16;
    let vectors = random_vectors(&mut rng, 1024, dim);
    let index = trained_index(dim, num_lists, &vectors);
    let (db, ivf, primary, secondary) = open_db(index);

    put_vectors(&db, primary, &vectors);

    let mut cursor =
        SecondaryIndexIterator::new(&*ivf, db.new_iterator(secondary).expect("iterator"));

    for i in [0usize, 16, 32, 64] {
        let target = floats_to_bytes(&vectors[i]);
        let result = ivf.find_knn(&mut cursor, &target, 8, num_lists).expect("find_knn");

        assert_eq!(result.len(), 8);
        assert_eq!(result[0].0, i.to_string().into_bytes());
        assert_eq!(result[0].1, 0.0);

        for pair in result.windows(2) {
            assert!(pair[0].1 <= pair[1].1, "distances must be non-decreasing");
        }
        for (pk, _) in &result[1..] {
            assert_ne!(pk, &i.to_string().into_bytes());
        }
    }
}

#[test]
fn knn_matches_reference_inverted_lists() {
    // Two identically trained indices: one searches the reference in-memory
    // lists, the other the database-backed lists.
    let mut rng = StdRng::seed_from_u64(42);
    let dim = 8;
    let num_lists = 4;
    let training = random_vectors(&mut rng, 256, dim);

    let reference_index = trained_index(dim, num_lists, &training);
    let db_index = trained_index(dim, num_lists, &training);

    let (db, ivf, primary, secondary) = open_db(db_index);

    let mut rng_db = StdRng::seed_from_u64(123);
    let vectors = random_vectors(&mut rng_db, 512, dim);

    let mut reference_lists = ArrayInvertedLists::new(num_lists);
    for (id, vector) in vectors.iter().enumerate() {
        let list_no = reference_index.assign(vector).expect("assign");
        let code = reference_index.encode(vector, list_no).expect("encode");
        reference_lists.add(list_no, id, code).expect("add");
    }
    put_vectors(&db, primary, &vectors);

    let mut rng_query = StdRng::seed_from_u64(456);
    let queries = random_vectors(&mut rng_query, 32, dim);

    let mut cursor =
        SecondaryIndexIterator::new(&*ivf, db.new_iterator(secondary).expect("iterator"));

    for neighbors in [1usize, 2, 4] {
        for probes in [1usize, 2, 4] {
            for query in &queries {
                let expected = reference_index
                    .search(query, neighbors, probes, &mut reference_lists)
                    .expect("reference search");

                let result = ivf
                    .find_knn(&mut cursor, &floats_to_bytes(query), neighbors, probes)
                    .expect("find_knn");

                assert_eq!(result.len(), expected.len());
                for ((pk, distance), (expected_id, expected_distance)) in
                    result.iter().zip(expected.iter())
                {
                    let id: usize = String::from_utf8(pk.clone())
                        .expect("utf8 pk")
                        .parse()
                        .expect("numeric pk");
                    assert_eq!(id, *expected_id);
                    assert_eq!(distance, expected_distance);
                }
            }
        }
    }
}

#[test]
fn knn_rejects_invalid_arguments() {
    let (db, ivf, _primary, secondary) = open_db(axis_index());

    let mut cursor =
        SecondaryIndexIterator::new(&*ivf, db.new_iterator(secondary).expect("iterator"));
    let target = floats_to_bytes(&[1.0, 0.0, 0.0, 0.0]);

    // Wrong target size.
    let err = ivf.find_knn(&mut cursor, b"foo", 8, 2).expect_err("bad target");
    assert!(err.is_invalid_argument());

    // Zero neighbors.
    let err = ivf.find_knn(&mut cursor, &target, 0, 2).expect_err("bad neighbors");
    assert!(err.is_invalid_argument());

    // Zero probes.
    let err = ivf.find_knn(&mut cursor, &target, 8, 0).expect_err("bad probes");
    assert!(err.is_invalid_argument());
}

#[test]
fn knn_returns_fewer_when_lists_are_exhausted() {
    let (db, ivf, primary, secondary) = open_db(axis_index());

    let mut txn = db.begin_transaction().expect("begin");
    txn.put_entity(Some(primary), b"only", embedding_record(&[1.0, 0.0, 0.0, 0.0]), true)
        .expect("put");
    txn.commit().expect("commit");

    let mut cursor =
        SecondaryIndexIterator::new(&*ivf, db.new_iterator(secondary).expect("iterator"));
    let result = ivf
        .find_knn(&mut cursor, &floats_to_bytes(&[1.0, 0.0, 0.0, 0.0]), 8, 2)
        .expect("find_knn");

    assert_eq!(result.len(), 1);
    assert_eq!(result[0].0, b"only".to_vec());
    assert_eq!(result[0].1, 0.0);
}

#[test]
fn cursor_accepts_query_embeddings_as_seek_targets() {
    let (db, ivf, primary, secondary) = open_db(axis_index());

    let near_first_axis = [1.0f32, 0.1, 0.0, 0.0];
    let near_second_axis = [0.1f32, 1.0, 0.0, 0.0];

    let mut txn = db.begin_transaction().expect("begin");
    txn.put_entity(Some(primary), b"x", embedding_record(&near_first_axis), true).expect("put");
    txn.put_entity(Some(primary), b"y", embedding_record(&near_second_axis), true).expect("put");
    txn.commit().expect("commit");

    // Seeking with a raw embedding scans that embedding's cluster.
    let mut cursor =
        SecondaryIndexIterator::new(&*ivf, db.new_iterator(secondary).expect("iterator"));
    cursor.seek(&floats_to_bytes(&near_first_axis)).expect("seek");
    assert!(cursor.valid());
    assert_eq!(cursor.primary_key(), Some(b"x".as_slice()));
    cursor.next();
    assert!(!cursor.valid());

    cursor.seek(&floats_to_bytes(&near_second_axis)).expect("seek");
    assert!(cursor.valid());
    assert_eq!(cursor.primary_key(), Some(b"y".as_slice()));
}

#[test]
fn concurrent_overwrites_leave_one_winning_entry() {
    let (db, ivf, primary, secondary) = open_db(axis_index());

    let first = [1.0f32, 0.0, 0.0, 0.0];
    let second = [0.0f32, 1.0, 0.0, 0.0];

    let db_ref = &db;
    std::thread::scope(|scope| {
        for vector in [first, second] {
            scope.spawn(move || {
                let mut txn = db_ref.begin_transaction().expect("begin");
                txn.put_entity(Some(primary), b"shared", embedding_record(&vector), true)
                    .expect("put");
                txn.commit().expect("commit");
            });
        }
    });

    // Exactly one entry remains and its cluster matches the stored record.
    let txn = db.begin_transaction().expect("begin");
    let record = txn.get_entity(Some(primary), b"shared").expect("get").expect("record");
    let stored_label = {
        let column = record.get(EMBEDDING_COLUMN).expect("column");
        let (label, _) = decode_varint_signed(column).expect("varint");
        label
    };

    let mut it = db.new_iterator(secondary).expect("iterator");
    it.seek_to_first();
    assert!(it.valid());
    let (label, pk) = split_entry_key(it.key().expect("key"));
    assert_eq!(pk, b"shared");
    assert_eq!(label, stored_label);
    it.next();
    assert!(!it.valid(), "exactly one entry expected");

    let winner_clusters = [
        ivf.vector_index().assign(&first).expect("assign") as i64,
        ivf.vector_index().assign(&second).expect("assign") as i64,
    ];
    assert!(winner_clusters.contains(&label));
}
