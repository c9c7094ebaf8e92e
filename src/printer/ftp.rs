//! Implicit-TLS artifact upload to the printer's storage.

use std::path::Path;

use futures::io::Cursor;
use suppaftp::async_native_tls::TlsConnector;
use suppaftp::types::FileType;
use suppaftp::{AsyncNativeTlsConnector, AsyncNativeTlsFtpStream};

use super::{PrinterError, Result};
use crate::config::PrinterConfig;

const FTPS_PORT: u16 = 990;
const FTP_USER: &str = "bblp";

/// Upload the artifact over implicit FTPS under its base name and return
/// the remote name. The session is released on every path.
pub async fn upload_artifact(config: &PrinterConfig, artifact: &Path) -> Result<String> {
    let remote_name = artifact
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .ok_or_else(|| {
            PrinterError::Transfer(format!(
                "artifact has no usable file name: {}",
                artifact.display()
            ))
        })?;

    let data = tokio::fs::read(artifact).await?;

    // The printer ships a self-signed certificate; verification is relaxed
    // when `printer.accept_invalid_certs` is set (the default).
    let connector = TlsConnector::new().danger_accept_invalid_certs(config.accept_invalid_certs);

    let addr = format!("{}:{FTPS_PORT}", config.ip);
    let mut ftp = AsyncNativeTlsFtpStream::connect_secure_implicit(
        &addr,
        AsyncNativeTlsConnector::from(connector),
        &config.ip,
    )
    .await
    .map_err(|e| PrinterError::Transfer(format!("connect to {addr}: {e}")))?;

    let result = transfer(&mut ftp, config, &remote_name, &data).await;
    let _ = ftp.quit().await;
    result?;

    tracing::info!(remote = %remote_name, bytes = data.len(), "artifact uploaded via FTPS");
    Ok(remote_name)
}

async fn transfer(
    ftp: &mut AsyncNativeTlsFtpStream,
    config: &PrinterConfig,
    remote_name: &str,
    data: &[u8],
) -> Result<()> {
    ftp.login(FTP_USER, &config.access_code)
        .await
        .map_err(|e| PrinterError::Transfer(format!("login: {e}")))?;
    ftp.transfer_type(FileType::Binary)
        .await
        .map_err(|e| PrinterError::Transfer(format!("set binary mode: {e}")))?;
    let mut reader = Cursor::new(data);
    ftp.put_file(remote_name, &mut reader)
        .await
        .map_err(|e| PrinterError::Transfer(format!("upload {remote_name}: {e}")))?;
    Ok(())
}
