use anyhow::bail;
use async_compression::tokio::bufread::{BzDecoder, GzipDecoder, XzDecoder};
use std::ffi::OsStr;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufRead, AsyncRead, BufReader, ReadBuf};
use tracing::debug;

#[derive(Debug, Default)]
pub struct Extractor;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
enum Compression {
    None,
    Gzip,
    Xz,
    Bz,
}

const GUESSES: &[(&str, Compression)] = &[
    (".tar.gz", Compression::Gzip),
    (".tgz", Compression::Gzip),
    (".tar.xz", Compression::Xz),
    (".tar.bz2", Compression::Bz),
    (".tar.bz", Compression::Bz),
    (".tar", Compression::None),
];

enum Decompressor<R: AsyncBufRead> {
    PassThrough(R),
    Gzip(GzipDecoder<R>),
    Xz(XzDecoder<R>),
    Bz(BzDecoder<R>),
}

impl<R: AsyncBufRead + Unpin> AsyncRead for Decompressor<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Decompressor::PassThrough(r) => Pin::new(r).poll_read(cx, buf),
            Decompressor::Gzip(r) => Pin::new(r).poll_read(cx, buf),
            Decompressor::Xz(r) => Pin::new(r).poll_read(cx, buf),
            Decompressor::Bz(r) => Pin::new(r).poll_read(cx, buf),
        }
    }
}

impl Extractor {
    /// Unpacks a tarball into `dest`, guessing the compression from the
    /// file name.
    pub async fn extract(&self, archive: &Path, dest: &Path) -> anyhow::Result<()> {
        let name = archive.file_name().and_then(OsStr::to_str).unwrap_or("");

        let compression = GUESSES.iter().find_map(|(suffix, compression)| {
            if name.ends_with(suffix) {
                Some(*compression)
            } else {
                None
            }
        });

        let compression = match compression {
            Some(compression) => compression,
            None => bail!("couldn't guess the archive type of {}", archive.display()),
        };

        debug!(archive = %archive.display(), dest = %dest.display(), "unpacking");
        tokio::fs::create_dir_all(dest).await?;

        let read = OpenOptions::new().read(true).open(archive).await?;
        let read = BufReader::new(read);
        let read = match compression {
            Compression::None => Decompressor::PassThrough(read),
            Compression::Gzip => Decompressor::Gzip(GzipDecoder::new(read)),
            Compression::Xz => Decompressor::Xz(XzDecoder::new(read)),
            Compression::Bz => Decompressor::Bz(BzDecoder::new(read)),
        };

        let mut unpacker = tokio_tar::Archive::new(read);
        unpacker.unpack(dest).await?;

        Ok(())
    }
}
