use arkv_crypto::FileId;
use serde::{Deserialize, Serialize};

/// Descriptive record a field officer attaches to a scanned document.
///
/// Serialised as camelCase JSON and stored as an encrypted metadata record
/// under the same file key as the document body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub field_officer: String,
    pub location: String,
    pub date_of_scanning: String,
    pub location_of_scanning: String,
    pub official_title: String,
    pub document_type: String,
    pub name_of_document_review: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuing_authority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_and_id_number_of_translating_party: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_and_title_issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_of_issuance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_issuance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_official_dates: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes_photo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principle_person_named_on_doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_person_named_and_role_on_doc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_information_document_holder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent_of_document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_physical_aspects: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticity_marks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_to_other_docs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes_on_document_or_holder: Option<String>,
    #[serde(
        default,
        rename = "informationDigitallyRecordedByFO",
        skip_serializing_if = "Option::is_none"
    )]
    pub information_digitally_recorded_by_fo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewers_notes: Option<String>,

    // Filled in from the data record at upload time
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub data_tx_id: String,
    #[serde(default)]
    pub data_content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<FileId>,
}

impl DocumentMetadata {
    /// Link this metadata to the data record it describes.
    pub fn attach_to_record(
        &mut self,
        file_id: FileId,
        size: u64,
        content_type: impl Into<String>,
        data_tx_id: impl Into<String>,
    ) {
        self.file_id = Some(file_id);
        self.size = size;
        self.data_content_type = content_type.into();
        self.data_tx_id = data_tx_id.into();
    }
}
