// Copyright (c) 2016-2018 The http-serve developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Benchmarks of serving an in-memory resource through the full response
//! pipeline: full-body GET, single-range GET, and multi-range GET, against
//! an in-memory [`Storage`] implementation.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use http::header::{HeaderMap, HeaderValue, RANGE};
use http::Method;
use respond_range::{
    respond, BufferStream, DynBody, Reference, ServeOptions, Storage, StorageError, StorageInfo,
    StreamRange,
};
use tokio::runtime::Runtime;

const SIZE: usize = 256 * 1024;

struct MemStorage {
    data: Bytes,
}

impl MemStorage {
    fn new(size: usize) -> Self {
        let data: Vec<u8> = (0..size).map(|i| b'a' + (i % 26) as u8).collect();
        MemStorage { data: Bytes::from(data) }
    }
}

#[async_trait]
impl Storage for MemStorage {
    type Data = Arc<Bytes>;

    async fn open(
        &self,
        _reference: &Reference,
        _request_headers: &HeaderMap,
    ) -> Result<StorageInfo<Self::Data>, StorageError> {
        let mut info = StorageInfo::new(Arc::new(self.data.clone()));
        info.size = Some(self.data.len() as u64);
        info.mtime = Some(SystemTime::UNIX_EPOCH);
        info.mime_type = Some("text/plain".to_string());
        Ok(info)
    }

    fn create_read_stream(
        &self,
        info: &StorageInfo<Self::Data>,
        range: Option<StreamRange>,
        _auto_close: bool,
    ) -> DynBody {
        let data = info.attached_data.clone();
        let slice = match range {
            Some(r) => data.slice(r.start as usize..=r.end as usize),
            None => (*data).clone(),
        };
        Box::pin(BufferStream::new(slice))
    }

    async fn close(&self, _info: StorageInfo<Self::Data>) {}
}

fn bench_full(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let storage = MemStorage::new(SIZE);
    let options = ServeOptions::default();
    let mut group = c.benchmark_group("full_body");
    group.throughput(Throughput::Bytes(SIZE as u64));
    group.bench_function("get", |b| {
        b.to_async(&rt).iter(|| async {
            let headers = HeaderMap::new();
            let resp = respond(&storage, Reference::Path("/x".into()), Some(&Method::GET), &headers, &options)
                .await
                .unwrap();
            criterion::black_box(resp.status);
        });
    });
    group.finish();
}

fn bench_single_range(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let storage = MemStorage::new(SIZE);
    let options = ServeOptions::default();
    let mut headers = HeaderMap::new();
    headers.insert(RANGE, HeaderValue::from_static("bytes=1000-2000"));
    c.bench_function("single_range/get", |b| {
        b.to_async(&rt).iter(|| async {
            let resp = respond(&storage, Reference::Path("/x".into()), Some(&Method::GET), &headers, &options)
                .await
                .unwrap();
            criterion::black_box(resp.status);
        });
    });
}

fn bench_multi_range(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let storage = MemStorage::new(SIZE);
    let options = ServeOptions::default();
    let mut headers = HeaderMap::new();
    headers.insert(RANGE, HeaderValue::from_static("bytes=0-999,2000-2999,4000-4999"));
    c.bench_function("multi_range/get", |b| {
        b.to_async(&rt).iter(|| async {
            let resp = respond(&storage, Reference::Path("/x".into()), Some(&Method::GET), &headers, &options)
                .await
                .unwrap();
            criterion::black_box(resp.status);
        });
    });
}

criterion_group!(benches, bench_full, bench_single_range, bench_multi_range);
criterion_main!(benches);
