//! File upload request shape for `/api/method/upload_file`.

use super::transport::MultipartForm;

/// Path of the upload RPC endpoint.
pub const UPLOAD_PATH: &str = "/api/method/upload_file";

/// A file to upload along with where it should land on the server.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub is_private: bool,
    pub folder: String,
    /// Document (doctype, name) to attach the file to.
    pub attach_to: Option<(String, String)>,
    /// Attachment field on the attached document.
    pub fieldname: Option<String>,
    pub optimize: bool,
}

impl FileUpload {
    /// A private upload into the `Home` folder.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            is_private: true,
            folder: "Home".to_string(),
            attach_to: None,
            fieldname: None,
            optimize: false,
        }
    }

    pub(crate) fn to_form(&self) -> MultipartForm {
        let mut fields = vec![
            (
                "is_private".to_string(),
                if self.is_private { "1" } else { "0" }.to_string(),
            ),
            ("folder".to_string(), self.folder.clone()),
        ];

        if let Some((doctype, docname)) = &self.attach_to {
            fields.push(("doctype".to_string(), doctype.clone()));
            fields.push(("docname".to_string(), docname.clone()));
            // A field name only means something for an attachment
            if let Some(fieldname) = &self.fieldname {
                fields.push(("fieldname".to_string(), fieldname.clone()));
            }
        }

        if self.optimize {
            fields.push(("optimize".to_string(), "1".to_string()));
        }

        MultipartForm {
            fields,
            file_field: "file".to_string(),
            file_name: self.file_name.clone(),
            bytes: self.bytes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'a>(form: &'a MultipartForm, name: &str) -> Option<&'a str> {
        form.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_defaults_are_private_home() {
        let form = FileUpload::new("a.pdf", b"%PDF".to_vec()).to_form();
        assert_eq!(field(&form, "is_private"), Some("1"));
        assert_eq!(field(&form, "folder"), Some("Home"));
        assert_eq!(field(&form, "doctype"), None);
        assert_eq!(field(&form, "optimize"), None);
        assert_eq!(form.file_field, "file");
        assert_eq!(form.file_name, "a.pdf");
    }

    #[test]
    fn test_public_attached_upload() {
        let mut upload = FileUpload::new("logo.png", vec![1, 2, 3]);
        upload.is_private = false;
        upload.folder = "Home/Attachments".to_string();
        upload.attach_to = Some(("Customer".to_string(), "CUST-0001".to_string()));
        upload.fieldname = Some("image".to_string());
        upload.optimize = true;

        let form = upload.to_form();
        assert_eq!(field(&form, "is_private"), Some("0"));
        assert_eq!(field(&form, "folder"), Some("Home/Attachments"));
        assert_eq!(field(&form, "doctype"), Some("Customer"));
        assert_eq!(field(&form, "docname"), Some("CUST-0001"));
        assert_eq!(field(&form, "fieldname"), Some("image"));
        assert_eq!(field(&form, "optimize"), Some("1"));
        assert_eq!(form.bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_fieldname_ignored_without_attachment() {
        let mut upload = FileUpload::new("a.txt", Vec::new());
        upload.fieldname = Some("image".to_string());
        assert_eq!(field(&upload.to_form(), "fieldname"), None);
    }
}
