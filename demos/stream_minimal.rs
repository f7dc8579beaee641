use edgar_ingest::{is_data_line, Accession, IndexSource};
use futures::StreamExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let source = IndexSource::from_path("./data/master.20240115.idx.gz");
    let mut lines = source.lines().await?;

    let mut txt = 0u64;
    while let Some(line) = lines.next().await {
        let line = line?;
        if !is_data_line(&line.text) {
            continue;
        }
        let path = line.text.rsplit('|').next().unwrap_or_default();
        if let Some(accession) = Accession::from_path(path.trim()) {
            if accession.extension == "txt" {
                txt += 1;
            }
        }
    }
    println!("txt filings: {txt}");
    Ok(())
}
