//! Stream compression facade for run files (feature-gated).
//!
//! Keep this tiny and synchronous. A run is compressed as one stream, so the
//! record codec never sees compressed bytes. We only support `None`, `Zstd`
//! and `Lz4` (frame format).

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};

use spillsort_core::config::Compression;

use crate::error::{Result, RunError};

#[cfg(feature = "zstd")]
const ZSTD_LEVEL: i32 = 3;

/// Write side of a run file.
pub(crate) enum RunSink {
    Plain(BufWriter<File>),
    #[cfg(feature = "zstd")]
    Zstd(zstd::stream::Encoder<'static, BufWriter<File>>),
    #[cfg(feature = "lz4")]
    Lz4(lz4_flex::frame::FrameEncoder<BufWriter<File>>),
}

impl RunSink {
    pub(crate) fn new(compression: Compression, file: File, buffer_bytes: usize) -> Result<Self> {
        let inner = BufWriter::with_capacity(buffer_bytes, file);
        match compression {
            Compression::None => Ok(RunSink::Plain(inner)),
            Compression::Zstd => {
                #[cfg(feature = "zstd")]
                {
                    let enc = zstd::stream::Encoder::new(inner, ZSTD_LEVEL)
                        .map_err(RunError::io("zstd init"))?;
                    Ok(RunSink::Zstd(enc))
                }
                #[cfg(not(feature = "zstd"))]
                {
                    drop(inner);
                    Err(RunError::UnsupportedCompression("zstd"))
                }
            }
            Compression::Lz4 => {
                #[cfg(feature = "lz4")]
                {
                    Ok(RunSink::Lz4(lz4_flex::frame::FrameEncoder::new(inner)))
                }
                #[cfg(not(feature = "lz4"))]
                {
                    drop(inner);
                    Err(RunError::UnsupportedCompression("lz4"))
                }
            }
        }
    }

    /// Finish the compression frame and flush everything down to the file.
    pub(crate) fn finish(self) -> Result<File> {
        let buffered = match self {
            RunSink::Plain(w) => w,
            #[cfg(feature = "zstd")]
            RunSink::Zstd(enc) => enc.finish().map_err(RunError::io("zstd finish"))?,
            #[cfg(feature = "lz4")]
            RunSink::Lz4(enc) => enc.finish().map_err(|e| RunError::Io {
                op: "lz4 finish",
                source: io::Error::new(io::ErrorKind::Other, e),
            })?,
        };
        buffered
            .into_inner()
            .map_err(|e| RunError::Io {
                op: "flush",
                source: e.into_error(),
            })
    }
}

impl Write for RunSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            RunSink::Plain(w) => w.write(buf),
            #[cfg(feature = "zstd")]
            RunSink::Zstd(w) => w.write(buf),
            #[cfg(feature = "lz4")]
            RunSink::Lz4(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            RunSink::Plain(w) => w.flush(),
            #[cfg(feature = "zstd")]
            RunSink::Zstd(w) => w.flush(),
            #[cfg(feature = "lz4")]
            RunSink::Lz4(w) => w.flush(),
        }
    }
}

/// Read side of a run file. Always buffered so codecs can peek for EOF.
pub(crate) enum RunSource {
    Plain(BufReader<File>),
    #[cfg(feature = "zstd")]
    Zstd(BufReader<zstd::stream::Decoder<'static, BufReader<File>>>),
    #[cfg(feature = "lz4")]
    Lz4(BufReader<lz4_flex::frame::FrameDecoder<BufReader<File>>>),
}

impl RunSource {
    pub(crate) fn new(compression: Compression, file: File, buffer_bytes: usize) -> Result<Self> {
        let inner = BufReader::with_capacity(buffer_bytes, file);
        match compression {
            Compression::None => Ok(RunSource::Plain(inner)),
            Compression::Zstd => {
                #[cfg(feature = "zstd")]
                {
                    let dec = zstd::stream::Decoder::with_buffer(inner)
                        .map_err(RunError::io("zstd init"))?;
                    Ok(RunSource::Zstd(BufReader::with_capacity(buffer_bytes, dec)))
                }
                #[cfg(not(feature = "zstd"))]
                {
                    drop(inner);
                    Err(RunError::UnsupportedCompression("zstd"))
                }
            }
            Compression::Lz4 => {
                #[cfg(feature = "lz4")]
                {
                    let dec = lz4_flex::frame::FrameDecoder::new(inner);
                    Ok(RunSource::Lz4(BufReader::with_capacity(buffer_bytes, dec)))
                }
                #[cfg(not(feature = "lz4"))]
                {
                    drop(inner);
                    Err(RunError::UnsupportedCompression("lz4"))
                }
            }
        }
    }
}

impl Read for RunSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            RunSource::Plain(r) => r.read(buf),
            #[cfg(feature = "zstd")]
            RunSource::Zstd(r) => r.read(buf),
            #[cfg(feature = "lz4")]
            RunSource::Lz4(r) => r.read(buf),
        }
    }
}

impl BufRead for RunSource {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            RunSource::Plain(r) => r.fill_buf(),
            #[cfg(feature = "zstd")]
            RunSource::Zstd(r) => r.fill_buf(),
            #[cfg(feature = "lz4")]
            RunSource::Lz4(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            RunSource::Plain(r) => r.consume(amt),
            #[cfg(feature = "zstd")]
            RunSource::Zstd(r) => r.consume(amt),
            #[cfg(feature = "lz4")]
            RunSource::Lz4(r) => r.consume(amt),
        }
    }
}
