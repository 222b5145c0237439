use std::path::Path;

use tokio::{
    fs::File,
    io::{self, AsyncBufReadExt, BufReader, Lines},
};

/// Stream the lines of a file, one at a time, without holding the whole file in memory
pub async fn file_reader(path: impl AsRef<Path>) -> io::Result<Lines<BufReader<File>>> {
    let f = File::open(path).await?;

    Ok(BufReader::new(f).lines())
}
