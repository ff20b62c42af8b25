//! Cache-resident state for an in-flight chunked upload.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedPart {
    pub part_number: i32,
    pub e_tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    pub s3_upload_id: String,
    pub bucket_file_path: String,
    pub total_chunks: u32,
    pub original_file_name: String,
    pub mime_type: String,
    pub uploaded_parts: Vec<UploadedPart>,
}

impl UploadSession {
    pub fn new(s3_upload_id: String, bucket_file_path: String, total_chunks: u32, original_file_name: String, mime_type: String) -> Self {
        Self { s3_upload_id, bucket_file_path, total_chunks, original_file_name, mime_type, uploaded_parts: Vec::new() }
    }

    /// Records a part's ETag, overwriting any prior entry for the same
    /// part number (last write wins, per the assembler's race tolerance).
    pub fn record_part(&mut self, part_number: i32, e_tag: String) {
        if let Some(existing) = self.uploaded_parts.iter_mut().find(|p| p.part_number == part_number) {
            existing.e_tag = e_tag;
        } else {
            self.uploaded_parts.push(UploadedPart { part_number, e_tag });
        }
    }

    /// Parts sorted by part number, ready for the multipart completion call.
    pub fn sorted_parts(&self) -> Vec<UploadedPart> {
        let mut parts = self.uploaded_parts.clone();
        parts.sort_by_key(|p| p.part_number);
        parts
    }
}
