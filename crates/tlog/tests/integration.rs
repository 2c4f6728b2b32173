use std::sync::Arc;

use rand::Rng;
use tlog::{
    branch_hash, empty_root, leaf_hash, split_point, verify_audit_proof, verify_consistency_proof,
    Ed25519Signer, Ed25519Verifier, Hash32, LogCore, LogSigner, MapEntry, MemoryStorage, Record,
    SparseMap, Storage, TlogError, VerifiableLog, MAX_RECORD_PAYLOAD,
};

const DATA: [&str; 7] = ["", "a", "b", "c", "d", "efghijk", "lmnopqrstuvwxyz"];

const ROOTS: [&str; 7] = [
    "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d",
    "688dc6244b041199e7ab4990df6340ce3dc14caa5cd5a0e1131addaa1209e1a6",
    "652297b9504045a600942bcdf9ae5c2400be42d51139c7fb63ab3ee439ff110d",
    "4a9bab0b70e36b453e967468fc209705d9171fd05e9cf9e0ed6c2dff673fc790",
    "ff9cdaec73345d3896e37ff5681084b7be4097839f760e621412f9343d139f22",
    "a44a4f5f5190f8bf6acbfecc50e56374072196c17aa5fd46af01a5b9674307cf",
    "968244ebd454ce024d380be757b570886f8449f41395c761ec363a08a8f18210",
];

fn h(s: &str) -> Hash32 {
    hex::decode(s).unwrap().try_into().unwrap()
}

fn build(data: &[Vec<u8>]) -> (MemoryStorage, VerifiableLog) {
    let store = MemoryStorage::new();
    let mut log = VerifiableLog::new(0);
    for d in data {
        store.update(|txn| log.append(txn, d)).unwrap();
    }
    (store, log)
}

fn sample_log() -> (MemoryStorage, VerifiableLog) {
    let data: Vec<Vec<u8>> = DATA.iter().map(|s| s.as_bytes().to_vec()).collect();
    build(&data)
}

/// Reference root computed recursively over the full leaf set.
fn reference_root(data: &[Vec<u8>]) -> Hash32 {
    match data.len() {
        0 => empty_root(),
        1 => leaf_hash(&data[0]),
        n => {
            let k = split_point(n as u64) as usize;
            branch_hash(&reference_root(&data[..k]), &reference_root(&data[k..]))
        }
    }
}

fn random_data(n: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| {
            let len = rng.gen_range(0..24);
            (0..len).map(|_| rng.gen()).collect()
        })
        .collect()
}

#[test]
fn test_empty_log_root() {
    let store = MemoryStorage::new();
    let log = VerifiableLog::new(0);
    let root = store.view(|txn| log.root(txn)).unwrap();
    assert_eq!(
        hex::encode(root),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn test_known_roots_after_each_append() {
    let store = MemoryStorage::new();
    let mut log = VerifiableLog::new(0);
    for (i, d) in DATA.iter().enumerate() {
        let index = store.update(|txn| log.append(txn, d.as_bytes())).unwrap();
        assert_eq!(index, i as u64);
        let root = store.view(|txn| log.root(txn)).unwrap();
        assert_eq!(hex::encode(root), ROOTS[i], "root after {} leaves", i + 1);
    }
}

#[test]
fn test_historical_roots() {
    let (store, log) = sample_log();
    for (i, expected) in ROOTS.iter().enumerate() {
        let root = store.view(|txn| log.root_at(txn, i as u64 + 1)).unwrap();
        assert_eq!(hex::encode(root), *expected);
    }
}

#[test]
fn test_known_audit_proofs() {
    let (store, log) = sample_log();
    let audit = |i, n| store.view(|txn| log.audit_proof(txn, i, n)).unwrap();

    assert!(audit(0, 0).is_empty());
    assert!(audit(0, 1).is_empty());
    assert_eq!(audit(1, 2), vec![h(ROOTS[0])]);
    assert_eq!(
        audit(0, 4),
        vec![
            h("022a6979e6dab7aa5ae4c3e5e45f7e977112a7e63593820dbec1ec738a24f93c"),
            h("a5eb6e7bcfaaff4957c342e0cbfe88209dbe2058fc3e1a3455cc071922c85741"),
        ]
    );
    assert_eq!(
        audit(4, 7),
        vec![
            h("bc78703cecc49c1119746b7baa573cc39274b72f40fe1e6c242fc524b1acd3f6"),
            h("e6d714a0c30dbe89616ee317930e7821a18f18c5a80307e08fc92e7809e52d86"),
            h(ROOTS[3]),
        ]
    );
    assert_eq!(
        audit(3, 5),
        vec![
            h("57eb35615d47f34ec714cacdf5fd74608a5e8e102724e80b24b287c0c27b6a31"),
            h(ROOTS[1]),
            h("d070dc5b8da9aea7dc0f5ad4c29d89965200059c9a0ceca3abd5da2492dcb71d"),
        ]
    );
    assert_eq!(
        audit(0, 7),
        vec![
            h("022a6979e6dab7aa5ae4c3e5e45f7e977112a7e63593820dbec1ec738a24f93c"),
            h("a5eb6e7bcfaaff4957c342e0cbfe88209dbe2058fc3e1a3455cc071922c85741"),
            h("49ad1f129f0f126dd6b90955fb177ab8941be0d7b5d0085c4813fcabb62b6ec9"),
        ]
    );
}

#[test]
fn test_known_consistency_proofs() {
    let (store, log) = sample_log();
    let consistency = |m, n| store.view(|txn| log.consistency_proof(txn, m, n)).unwrap();

    assert!(consistency(1, 1).is_empty());
    assert_eq!(
        consistency(2, 5),
        vec![
            h("a5eb6e7bcfaaff4957c342e0cbfe88209dbe2058fc3e1a3455cc071922c85741"),
            h("d070dc5b8da9aea7dc0f5ad4c29d89965200059c9a0ceca3abd5da2492dcb71d"),
        ]
    );
    assert_eq!(
        consistency(1, 7),
        vec![
            h("022a6979e6dab7aa5ae4c3e5e45f7e977112a7e63593820dbec1ec738a24f93c"),
            h("a5eb6e7bcfaaff4957c342e0cbfe88209dbe2058fc3e1a3455cc071922c85741"),
            h("49ad1f129f0f126dd6b90955fb177ab8941be0d7b5d0085c4813fcabb62b6ec9"),
        ]
    );
}

#[test]
fn test_two_of_four_boundary_node() {
    let data: Vec<Vec<u8>> = ["a", "b", "c", "d"].iter().map(|s| s.as_bytes().to_vec()).collect();
    let (store, log) = build(&data);
    let proof = store.view(|txn| log.consistency_proof(txn, 2, 4)).unwrap();
    let right = branch_hash(&leaf_hash(b"c"), &leaf_hash(b"d"));
    assert_eq!(proof, vec![right]);
}

#[test]
fn test_incremental_root_matches_recomputation() {
    let data = random_data(70);
    let store = MemoryStorage::new();
    let mut log = VerifiableLog::new(0);
    for (i, d) in data.iter().enumerate() {
        store.update(|txn| log.append(txn, d)).unwrap();
        let root = store.view(|txn| log.root(txn)).unwrap();
        assert_eq!(root, reference_root(&data[..=i]), "tree size {}", i + 1);
    }
}

#[test]
fn test_every_audit_proof_verifies() {
    let data = random_data(33);
    let (store, log) = build(&data);
    store
        .view(|txn| {
            for n in 1..=data.len() as u64 {
                let root = log.root_at(txn, n)?;
                for i in 0..n {
                    let proof = log.audit_proof(txn, i, n)?;
                    assert!(
                        verify_audit_proof(&root, n, i, &proof, &data[i as usize]),
                        "leaf {i} in tree {n}"
                    );
                }
            }
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_every_consistency_proof_verifies() {
    let data = random_data(33);
    let (store, log) = build(&data);
    store
        .view(|txn| {
            for n in 1..=data.len() as u64 {
                let new_root = log.root_at(txn, n)?;
                for m in 1..=n {
                    let old_root = log.root_at(txn, m)?;
                    let proof = log.consistency_proof(txn, m, n)?;
                    assert!(
                        verify_consistency_proof(&old_root, &new_root, m, n, &proof),
                        "{m} -> {n}"
                    );
                }
            }
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_tampered_proofs_fail() {
    let data = random_data(13);
    let (store, log) = build(&data);
    store
        .view(|txn| {
            let n = data.len() as u64;
            let root = log.root_at(txn, n)?;
            for i in 0..n {
                let proof = log.audit_proof(txn, i, n)?;
                for e in 0..proof.len() {
                    let mut bad = proof.clone();
                    bad[e][7] ^= 0x40;
                    assert!(!verify_audit_proof(&root, n, i, &bad, &data[i as usize]));
                }
                let neighbour = if i + 1 < n { i + 1 } else { i - 1 };
                if data[neighbour as usize] != data[i as usize] {
                    assert!(!verify_audit_proof(&root, n, i, &proof, &data[neighbour as usize]));
                }
            }

            for m in 1..n {
                let old_root = log.root_at(txn, m)?;
                let proof = log.consistency_proof(txn, m, n)?;
                for e in 0..proof.len() {
                    let mut bad = proof.clone();
                    bad[e][0] ^= 0x01;
                    assert!(!verify_consistency_proof(&old_root, &root, m, n, &bad), "{m} -> {n}");
                }
            }
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_equal_size_consistency() {
    let (store, log) = sample_log();
    store
        .view(|txn| {
            for m in 0..=7u64 {
                assert!(log.consistency_proof(txn, m, m)?.is_empty());
            }
            let r5 = log.root_at(txn, 5)?;
            let r6 = log.root_at(txn, 6)?;
            assert!(verify_consistency_proof(&r5, &r5, 5, 5, &[]));
            assert!(!verify_consistency_proof(&r5, &r6, 5, 5, &[]));
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_out_of_range_requests_are_errors() {
    let (store, log) = sample_log();
    store
        .view(|txn| {
            assert!(matches!(log.audit_proof(txn, 7, 7), Err(TlogError::OutOfRange(_))));
            assert!(matches!(log.audit_proof(txn, 0, 8), Err(TlogError::OutOfRange(_))));
            assert!(matches!(log.consistency_proof(txn, 5, 3), Err(TlogError::OutOfRange(_))));
            assert!(matches!(log.consistency_proof(txn, 3, 9), Err(TlogError::OutOfRange(_))));
            assert!(matches!(log.root_at(txn, 8), Err(TlogError::OutOfRange(_))));
            assert!(log.consistency_proof(txn, 0, 7)?.is_empty());
            Ok(())
        })
        .unwrap();
}

fn open_core() -> LogCore<MemoryStorage> {
    LogCore::open("test", MemoryStorage::new(), Arc::new(Ed25519Signer::generate())).unwrap()
}

fn kv(k: &str, v: &str) -> (Vec<u8>, Vec<u8>) {
    (k.as_bytes().to_vec(), v.as_bytes().to_vec())
}

#[test]
fn test_genesis_head() {
    let core = open_core();
    let sth = core.sth().unwrap();
    assert_eq!(sth.tree_size, 0);
    assert_eq!(sth.log_root, empty_root());
    assert_eq!(sth.map_root, SparseMap::new().empty_root());
    assert!(sth.verify(&Ed25519Verifier::from_bytes(core.public_key()).unwrap()));
}

#[test]
fn test_submit_and_query() {
    let core = open_core();
    let sth = core.submit(&[kv("in1", "out1"), kv("in2", "out2")]).unwrap();
    assert_eq!(sth.tree_size, 2);
    assert_eq!(core.sth().unwrap(), sth);

    let entry = core.query(b"in2").unwrap().unwrap();
    assert_eq!(entry, MapEntry { value: b"out2".to_vec(), index: 1 });
    assert_eq!(core.query(b"missing").unwrap(), None);

    let records = core.records(0, 1).unwrap();
    assert_eq!(records[0], Record { key: b"in1".to_vec(), value: b"out1".to_vec() });

    let raw = core.entries(1, 1).unwrap();
    assert!(verify_audit_proof(&sth.log_root, 2, 1, &core.audit_proof(1, 2).unwrap(), &raw[0]));
    assert!(core.entries(1, 2).is_err());
}

#[test]
fn test_map_value_at_older_root() {
    let core = open_core();
    let first = core.submit(&[kv("k1", "v1")]).unwrap();
    let second = core.submit(&[kv("k2", "v2")]).unwrap();

    let (old, proof) = core.map_value(b"k2", &first.map_root).unwrap();
    assert_eq!(old, None);
    assert!(SparseMap::verify_proof(&proof, &first.map_root, b"k2", None));

    let (new, proof) = core.map_value(b"k2", &second.map_root).unwrap();
    let new = new.unwrap();
    assert!(SparseMap::verify_proof(&proof, &second.map_root, b"k2", Some(new.as_slice())));
    assert_eq!(MapEntry::decode(&new).unwrap().index, 1);

    let compressed = core.compress_proof(&proof);
    assert_eq!(core.decompress_proof(&compressed).unwrap(), proof);
}

#[test]
fn test_duplicate_submit_changes_nothing() {
    let core = open_core();
    core.submit(&[kv("k", "v")]).unwrap();
    let before = core.sth().unwrap();

    let err = core.submit(&[kv("fresh", "x"), kv("k", "other")]).unwrap_err();
    assert!(matches!(err, TlogError::DuplicateKey(_)));
    assert_eq!(core.sth().unwrap(), before);
    assert_eq!(core.query(b"fresh").unwrap(), None);

    let err = core.submit(&[kv("twice", "1"), kv("twice", "2")]).unwrap_err();
    assert!(matches!(err, TlogError::DuplicateKey(_)));
    assert_eq!(core.sth().unwrap().tree_size, 1);
}

#[test]
fn test_oversized_pair_is_rejected_before_writing() {
    let core = open_core();
    let half = MAX_RECORD_PAYLOAD / 2;
    let key = vec![b'k'; half];
    let fits = vec![b'v'; MAX_RECORD_PAYLOAD - half];
    let too_big = vec![b'v'; MAX_RECORD_PAYLOAD - half + 1];

    let err = core
        .submit(&[(b"small".to_vec(), b"x".to_vec()), (key.clone(), too_big)])
        .unwrap_err();
    assert!(matches!(err, TlogError::RecordTooLarge(n) if n == MAX_RECORD_PAYLOAD + 5));
    assert_eq!(core.sth().unwrap().tree_size, 0);

    core.submit(&[(key.clone(), fits.clone())]).unwrap();
    assert_eq!(core.query(&key).unwrap().unwrap().value, fits);
    assert_eq!(core.records(0, 0).unwrap()[0].key, key);
}

#[test]
fn test_submit_consistency_across_batches() {
    let core = open_core();
    let a = core.submit(&[kv("1", "a"), kv("2", "b"), kv("3", "c")]).unwrap();
    let b = core.submit(&[kv("4", "d"), kv("5", "e")]).unwrap();
    let proof = core.consistency_proof(a.tree_size, b.tree_size).unwrap();
    assert!(verify_consistency_proof(&a.log_root, &b.log_root, a.tree_size, b.tree_size, &proof));
    assert_eq!(core.root_at(3).unwrap(), a.log_root);
}

#[test]
fn test_verify_only_log_cannot_submit() {
    let signer = Ed25519Signer::generate();
    let store = MemoryStorage::new();
    let core = LogCore::open("w", store.clone(), Arc::new(signer)).unwrap();
    let public = core.public_key();
    drop(core);

    let verifier: Arc<dyn LogSigner> = Arc::new(Ed25519Verifier::from_bytes(public).unwrap());
    let reader = LogCore::open("r", store, verifier).unwrap();
    assert!(matches!(reader.submit(&[kv("k", "v")]), Err(TlogError::CannotSign)));
    assert_eq!(reader.sth().unwrap().tree_size, 0);
}

#[test]
fn test_reopen_with_wrong_key_is_rejected() {
    let store = MemoryStorage::new();
    LogCore::open("a", store.clone(), Arc::new(Ed25519Signer::generate())).unwrap();
    let res = LogCore::open("a", store, Arc::new(Ed25519Signer::generate()));
    assert!(matches!(res, Err(TlogError::BadSignature)));
}

#[test]
fn test_reopen_resumes_head() {
    let store = MemoryStorage::new();
    let signer = Ed25519Signer::generate();
    let seed = signer.seed_hex();
    let core = LogCore::open("a", store.clone(), Arc::new(signer)).unwrap();
    let sth = core.submit(&[kv("k", "v")]).unwrap();
    drop(core);

    let again = LogCore::open("a", store, Arc::new(Ed25519Signer::from_seed_hex(&seed).unwrap())).unwrap();
    assert_eq!(again.sth().unwrap(), sth);
    let next = again.submit(&[kv("k2", "v2")]).unwrap();
    assert_eq!(next.tree_size, 2);
}
