//! lakota - a version-controlled, content-addressed store for numerical
//! time series.
//!
//! Data lives in [`Series`](crate::series::Series): ordered, schema-bound
//! tables grouped into a [`Collection`](crate::collection::Collection) that
//! shares one append-only [`Changelog`](crate::changelog::Changelog). Writes
//! never mutate in place — they append immutable
//! [`Segment`](crate::segment::Segment)s and a new revision; reads resolve
//! overlapping writes by folding them oldest-to-newest, the same interval
//! subtraction [`Collection::merge`](crate::collection::Collection::merge)
//! uses to converge a fork. Everything is backed by a
//! [`Pod`](crate::pod::Pod): a uniform key/value surface over a local
//! filesystem, an S3-like object store, or memory.
//!
//! # Quick start
//!
//! ```
//! use lakota::repo::Repo;
//! use lakota::schema::{Column, Dtype, Schema};
//! use lakota::frame::{Array, Frame};
//!
//! let repo = Repo::open(&["memory://"]).unwrap();
//! let schema = Schema::new(vec![
//!     Column::new("ts", Dtype::Timestamp64, true),
//!     Column::new("value", Dtype::Float64, false),
//! ])
//! .unwrap();
//! let weather = repo.create_collection("weather", schema).unwrap();
//!
//! let frame = Frame::new(vec![
//!     ("ts".to_string(), Array::Timestamp64(vec![1, 2, 3])),
//!     ("value".to_string(), Array::Float64(vec![1.0, 2.0, 3.0])),
//! ]);
//! weather.series("brussels").write(&frame, "writer-a").unwrap();
//! let read = weather.series("brussels").read_all(None).unwrap();
//! assert_eq!(read.len(), 3);
//! ```

pub mod changelog;
pub mod codec;
pub mod collection;
pub mod config;
pub mod digest;
pub mod error;
pub mod frame;
pub mod interval;
pub mod object_store;
pub mod pod;
pub mod repo;
pub mod schema;
pub mod segment;
pub mod series;
pub mod shadow;
pub mod sync;
mod wire;
