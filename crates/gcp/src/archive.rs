//! 빌드 컨텍스트 아카이브 -- gzip tar 생성
//!
//! Cloud Build의 storage source는 gzip 압축된 tar를 기대합니다.

use std::io;

use flate2::Compression;
use flate2::write::GzEncoder;

/// 빌드 컨텍스트 Content-Type
pub const BUILD_CONTEXT_CONTENT_TYPE: &str = "application/gzip";

/// 파일 목록을 gzip tar 아카이브로 묶습니다.
///
/// 각 항목은 `(아카이브 내 경로, 내용)`이며 권한은 0644입니다.
pub fn build_context(files: &[(&str, &[u8])]) -> io::Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();
        builder.append_data(&mut header, path, *contents)?;
    }

    let encoder = builder.into_inner()?;
    encoder.finish()
}
