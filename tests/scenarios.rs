//! End-to-end scenarios exercising the write/read/fork/merge/push/pull
//! path against real backends.

use std::sync::Arc;

use lakota::codec::Identity;
use lakota::collection::Collection;
use lakota::config::Config;
use lakota::error::Error;
use lakota::frame::{Array, Frame, Value};
use lakota::object_store::ObjectStore;
use lakota::pod::{FilePod, MemoryPod, Pod};
use lakota::repo::Repo;
use lakota::schema::{Column, Dtype, Schema};

fn weather_schema() -> Arc<Schema> {
    return Arc::new(
        Schema::new(vec![Column::new("timestamp", Dtype::Timestamp64, true), Column::new("value", Dtype::Float64, false)])
            .unwrap(),
    );
}

fn days(values: &[i64]) -> Array {
    return Array::Timestamp64(values.to_vec());
}

fn floats(values: &[f64]) -> Array {
    return Array::Float64(values.to_vec());
}

fn ts_values(frame: &Frame) -> (Vec<i64>, Vec<f64>) {
    let ts = match frame.column("timestamp").unwrap() {
        Array::Timestamp64(v) => v.clone(),
        _ => panic!("wrong dtype"),
    };
    let value = match frame.column("value").unwrap() {
        Array::Float64(v) => v.clone(),
        _ => panic!("wrong dtype"),
    };
    return (ts, value);
}

fn day_key(n: i64) -> Vec<Value> {
    return vec![Value::Timestamp64(n)];
}

fn memory_collection(name: &str) -> Collection {
    let pod: Arc<dyn Pod> = Arc::new(MemoryPod::new());
    let store = Arc::new(ObjectStore::new(pod.clone(), "obj"));
    return Collection::from_parts(pod, store, name, weather_schema(), Config::default());
}

// Round trip: write four days, read a prefix, expect exactly those rows.
#[test]
fn round_trip_write_then_bounded_read() {
    let brussels = memory_collection("weather").series("Brussels");
    let frame = Frame::new(vec![
        ("timestamp".to_string(), days(&[1, 2, 3, 4])),
        ("value".to_string(), floats(&[1.0, 2.0, 3.0, 4.0])),
    ]);
    brussels.write(&frame, "writer-a").unwrap();

    let read = brussels.read(std::ops::Bound::Unbounded, std::ops::Bound::Included(day_key(3)), None).unwrap();
    assert_eq!(ts_values(&read), (vec![1, 2, 3], vec![1.0, 2.0, 3.0]));
}

// Shadow overwrite: a second, overlapping write shadows the stale tail
// of the first and leaves its untouched head alone.
#[test]
fn overlapping_write_shadows_the_stale_tail() {
    let brussels = memory_collection("weather").series("Brussels");
    brussels
        .write(
            &Frame::new(vec![
                ("timestamp".to_string(), days(&[1, 2, 3, 4])),
                ("value".to_string(), floats(&[1.0, 2.0, 3.0, 4.0])),
            ]),
            "writer-a",
        )
        .unwrap();
    brussels
        .write(
            &Frame::new(vec![
                ("timestamp".to_string(), days(&[2, 3, 4, 5])),
                ("value".to_string(), floats(&[10.0, 11.0, 12.0, 13.0])),
            ]),
            "writer-a",
        )
        .unwrap();

    let read = brussels.read_all(None).unwrap();
    assert_eq!(ts_values(&read), (vec![1, 2, 3, 4, 5], vec![1.0, 10.0, 11.0, 12.0, 13.0]));
}

// Fork + merge: two writers commit against the same stale parent, leaving
// two heads; merge converges them to one shared child digest.
#[test]
fn fork_then_merge_converges_to_one_child_digest() {
    let collection = memory_collection("weather");
    let brussels = collection.series("Brussels");
    brussels
        .write(
            &Frame::new(vec![
                ("timestamp".to_string(), days(&[1, 2, 3])),
                ("value".to_string(), floats(&[0.0, 1.0, 2.0])),
            ]),
            "writer-a",
        )
        .unwrap();

    // Writer B forks off the same head with an overlapping, newer write.
    let heads = collection.changelog().leafs().unwrap();
    let parent = heads.first().cloned();
    let entry_epoch = lakota::changelog::next_epoch(parent.as_ref());
    let frame_b = Frame::new(vec![
        ("timestamp".to_string(), days(&[2, 3, 4, 5])),
        ("value".to_string(), floats(&[10.0, 11.0, 12.0, 13.0])),
    ]);
    let segment = lakota::segment::Segment::write(&frame_b, collection.schema(), collection.store(), &Identity).unwrap();
    let segment_digest = collection.store().put(&segment.to_bytes()).unwrap();
    let payload = lakota::changelog::Payload::single(
        "Brussels",
        day_key(2),
        day_key(5),
        vec![segment_digest],
        entry_epoch,
        "writer-b",
    );
    collection.changelog().commit_at(parent.as_ref(), payload, "writer-b", Some(entry_epoch)).unwrap();

    assert_eq!(collection.changelog().leafs().unwrap().len(), 2);
    let outcome = collection.merge("writer-a").unwrap();
    assert!(outcome.merged);

    let heads_after = collection.changelog().leafs().unwrap();
    assert_eq!(heads_after[0].child_digest, heads_after[1].child_digest);

    let read = brussels.read_all(Some(&heads_after[0])).unwrap();
    assert_eq!(ts_values(&read), (vec![1, 2, 3, 4, 5], vec![0.0, 10.0, 11.0, 12.0, 13.0]));
}

// Cache behavior: compose [memory, file://remote]; once the authoritative
// remote is gone, listing (and hence discovering revisions) fails, but the
// already-warmed local cache still answers point reads. Restoring the remote
// recovers full service.
#[test]
fn cache_survives_a_temporarily_unreachable_remote() {
    let workdir = tempfile::tempdir().unwrap();
    let remote_path = workdir.path().join("remote");
    let backup_path = workdir.path().join("remote-backup");
    std::fs::create_dir_all(&remote_path).unwrap();

    let pod = lakota::pod::open(&["memory://", &format!("file://{}", remote_path.display())]).unwrap();
    let store = Arc::new(ObjectStore::new(pod.clone(), "obj"));
    let collection = Collection::from_parts(pod, store, "weather", weather_schema(), Config::default());
    let brussels = collection.series("Brussels");

    brussels
        .write(
            &Frame::new(vec![("timestamp".to_string(), days(&[1, 2])), ("value".to_string(), floats(&[1.0, 2.0]))]),
            "writer-a",
        )
        .unwrap();
    let first = brussels.read_all(None).unwrap();
    assert_eq!(ts_values(&first), (vec![1, 2], vec![1.0, 2.0]));

    // Destroy the remote (reversibly: move it aside rather than delete it).
    std::fs::rename(&remote_path, &backup_path).unwrap();
    let second = brussels.read_all(None).unwrap();
    assert_eq!(second.len(), 0);

    // Restore it.
    std::fs::rename(&backup_path, &remote_path).unwrap();
    let third = brussels.read_all(None).unwrap();
    assert_eq!(ts_values(&third), (vec![1, 2], vec![1.0, 2.0]));
}

// Push under a different name: the destination collection need not
// share the source's name for push to replicate the data into it.
#[test]
fn push_replicates_data_under_a_different_destination_name() {
    let local_pod: Arc<dyn Pod> = Arc::new(MemoryPod::new());
    let remote_pod: Arc<dyn Pod> = Arc::new(MemoryPod::new());
    let local_store = Arc::new(ObjectStore::new(local_pod.clone(), "obj"));
    let remote_store = Arc::new(ObjectStore::new(remote_pod.clone(), "obj"));

    let rainfall = Collection::from_parts(local_pod, local_store, "rainfall", weather_schema(), Config::default());
    let precipitation =
        Collection::from_parts(remote_pod, remote_store, "precipitation", weather_schema(), Config::default());

    rainfall
        .series("Brussels")
        .write(
            &Frame::new(vec![("timestamp".to_string(), days(&[1, 2])), ("value".to_string(), floats(&[5.0, 6.0]))]),
            "writer-a",
        )
        .unwrap();
    rainfall.push(&precipitation).unwrap();

    let read = precipitation.series("Brussels").read_all(None).unwrap();
    assert_eq!(ts_values(&read), (vec![1, 2], vec![5.0, 6.0]));
}

// Integrity: a corrupted segment byte on disk raises an integrity
// error on read, rather than silently returning bad data.
#[test]
fn corrupted_segment_raises_integrity_error() {
    let dir = tempfile::tempdir().unwrap();
    let pod: Arc<dyn Pod> = Arc::new(FilePod::new(dir.path()));
    let store = Arc::new(ObjectStore::new(pod.clone(), "obj"));
    let collection = Collection::from_parts(pod.clone(), store.clone(), "weather", weather_schema(), Config::default());
    let brussels = collection.series("Brussels");
    brussels
        .write(
            &Frame::new(vec![("timestamp".to_string(), days(&[1, 2])), ("value".to_string(), floats(&[1.0, 2.0]))]),
            "writer-a",
        )
        .unwrap();

    let revision = collection.changelog().leafs().unwrap().into_iter().next().unwrap();
    let entry = revision.payload.entries.first().unwrap().clone();
    let segment_digest = entry.segments.first().unwrap();
    let segment_bytes = store.get(segment_digest).unwrap();
    let mut pos = 0;
    let segment = lakota::segment::Segment::from_bytes(&segment_bytes, &mut pos).unwrap();
    let column_digest = &segment.columns.first().unwrap().1.digest;
    let (head, tail) = column_digest.split();
    let mut corrupted = store.get(column_digest).unwrap();
    corrupted[0] ^= 0xFF;
    pod.write(&format!("obj/{head}/{tail}"), &corrupted).unwrap();

    let err = brussels.read_all(None).unwrap_err();
    assert!(matches!(err, Error::Integrity { .. }));
}

// Repo-level wiring: create_collection + registry round trip.
#[test]
fn repo_registers_and_recovers_collections_by_name() {
    let repo = Repo::open(&["memory://"]).unwrap();
    let collection = repo.create_collection("weather", (*weather_schema()).clone()).unwrap();
    collection
        .series("Brussels")
        .write(
            &Frame::new(vec![("timestamp".to_string(), days(&[1, 2])), ("value".to_string(), floats(&[1.0, 2.0]))]),
            "writer-a",
        )
        .unwrap();

    let reopened = repo.collection("weather").unwrap().unwrap();
    let read = reopened.series("Brussels").read_all(None).unwrap();
    assert_eq!(ts_values(&read), (vec![1, 2], vec![1.0, 2.0]));
}
