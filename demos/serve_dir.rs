// Copyright (c) 2016-2018 The http-serve developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Serves a directory tree over HTTP/1.1 and HTTP/2, with conditional GET,
//! byte-range requests, and a directory listing for paths ending in `/`.
//!
//! ```text
//! $ cargo run --example serve_dir -- /usr/share/doc
//! $ curl -v -H 'Range: bytes=1-10' http://127.0.0.1:1337/README
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http::{HeaderMap, Request};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto;
use respond_range::{respond, FilesystemStorage, OnDirectory, Reference, ResponseSink, ServeOptions};
use tokio::net::TcpListener;

async fn handle(
    storage: Arc<FilesystemStorage>,
    req: Request<Incoming>,
) -> Result<http::Response<respond_range::DynBody>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let headers: HeaderMap = req.headers().clone();
    let options = ServeOptions::default();

    let resp = respond(&*storage, Reference::Path(path), Some(&method), &headers, &options)
        .await
        .expect("hyper always supplies a method");
    let sink = ResponseSink::new();
    Ok(sink
        .send(resp, Arc::new(respond_range::NoopObserver))
        .expect("a fresh sink has never sent before"))
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let root = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());
    let storage = Arc::new(FilesystemStorage::new(&root).with_on_directory(OnDirectory::ListFiles));

    let addr: SocketAddr = "127.0.0.1:1337".parse().unwrap();
    let listener = TcpListener::bind(addr).await.unwrap();
    println!("Serving {} on http://{}", root, addr);

    loop {
        let (stream, _) = listener.accept().await.unwrap();
        let io = TokioIo::new(stream);
        let storage = storage.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| handle(storage.clone(), req));
            if let Err(err) = auto::Builder::new(hyper_util::rt::TokioExecutor::new())
                .serve_connection(io, service)
                .await
            {
                eprintln!("connection error: {err}");
            }
        });
    }
}
