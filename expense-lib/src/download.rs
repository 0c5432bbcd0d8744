use crate::error::HandlerError;
use actix_files::NamedFile;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use std::io::ErrorKind;

/// Opens a stored file for download, offering `download_name` to the client.
/// A file that is referenced but gone from disk is a 404.
pub async fn open_stored_file(
    path: &str,
    download_name: Option<String>,
) -> Result<NamedFile, HandlerError> {
    let file = match NamedFile::open_async(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(HandlerError::not_found(format!(
                "File {} not found on disk",
                path
            )))
        }
        Err(e) => {
            return Err(HandlerError::Internal(
                anyhow::Error::new(e).context(format!("Unable to open file {}", path)),
            ))
        }
    };
    Ok(match download_name {
        Some(name) => file.set_content_disposition(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(name)],
        }),
        None => file,
    })
}
