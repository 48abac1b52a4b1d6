//! Concatenating standalone PDFs into one file.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId};

use super::EngineError;

fn merge_error(output: &Path, message: impl Display) -> EngineError {
    EngineError::Merge { output: output.to_path_buf(), message: message.to_string() }
}

fn type_name(object: &Object) -> &[u8] {
    object
        .as_dict()
        .ok()
        .and_then(|d| d.get(b"Type").ok())
        .and_then(|t| t.as_name().ok())
        .unwrap_or_default()
}

/// Append the pages of every input, in order, into one document at
/// `output`. Outlines of the inputs are dropped. Returns the page count.
pub fn merge_pdfs(inputs: &[PathBuf], output: &Path) -> Result<usize, EngineError> {
    if inputs.is_empty() {
        return Err(merge_error(output, "no input PDFs"));
    }

    let mut pages: Vec<(ObjectId, Object)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut next_id = 1;

    for input in inputs {
        let mut doc = Document::load(input)
            .map_err(|e| merge_error(output, format!("{}: {e}", input.display())))?;
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        for page_id in doc.get_pages().into_values() {
            let page = doc.get_object(page_id).map_err(|e| merge_error(output, e))?;
            pages.push((page_id, page.clone()));
        }
        objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.5");
    let mut catalog: Option<(ObjectId, Object)> = None;
    let mut root: Option<(ObjectId, Dictionary)> = None;

    for (id, object) in objects {
        let kind = type_name(&object);
        if kind == b"Catalog" {
            if catalog.is_none() {
                catalog = Some((id, object));
            }
        } else if kind == b"Pages" {
            // Every page tree node collapses into the first one.
            if let Ok(dict) = object.as_dict() {
                match &mut root {
                    Some((_, existing)) => existing.extend(dict),
                    None => root = Some((id, dict.clone())),
                }
            }
        } else if kind != b"Page" && kind != b"Outlines" && kind != b"Outline" {
            merged.objects.insert(id, object);
        }
    }

    let (Some((catalog_id, catalog)), Some((root_id, mut root))) = (catalog, root) else {
        return Err(merge_error(output, "input without a page tree"));
    };

    let count = pages.len();
    let mut kids = Vec::with_capacity(count);
    for (id, page) in pages {
        let mut dict = page.as_dict().map_err(|e| merge_error(output, e))?.clone();
        dict.set("Parent", root_id);
        merged.objects.insert(id, Object::Dictionary(dict));
        kids.push(Object::Reference(id));
    }
    root.remove(b"Parent");
    root.set("Count", count as i64);
    root.set("Kids", kids);
    merged.objects.insert(root_id, Object::Dictionary(root));

    let mut catalog = catalog.as_dict().map_err(|e| merge_error(output, e))?.clone();
    catalog.set("Pages", root_id);
    catalog.remove(b"Outlines");
    merged.objects.insert(catalog_id, Object::Dictionary(catalog));

    merged.trailer.set("Root", catalog_id);
    merged.max_id = merged.objects.len() as u32;
    merged.renumber_objects();
    merged.adjust_zero_pages();
    merged.compress();

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| merge_error(output, e))?;
    }
    merged.save(output).map_err(|e| merge_error(output, e))?;

    tracing::info!("merged {} PDFs ({} pages) into {}", inputs.len(), count, output.display());
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};
    use tempfile::TempDir;

    /// A PDF whose pages are `width` points wide, one per entry.
    fn write_pdf(path: &Path, widths: &[i64]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for width in widths {
            let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(*width),
                    Object::Integer(100),
                ],
            });
            kids.push(Object::Reference(page_id));
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    fn page_widths(path: &Path) -> Vec<i64> {
        let doc = Document::load(path).unwrap();
        doc.get_pages()
            .into_values()
            .map(|id| {
                let page = doc.get_object(id).unwrap().as_dict().unwrap();
                page.get(b"MediaBox").unwrap().as_array().unwrap()[2].as_i64().unwrap()
            })
            .collect()
    }

    #[test]
    fn test_pages_are_appended_in_input_order() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        write_pdf(&a, &[110]);
        write_pdf(&b, &[220, 230]);

        let out = dir.path().join("out/merged.pdf");
        let count = merge_pdfs(&[b.clone(), a.clone()], &out).unwrap();

        assert_eq!(count, 3);
        assert_eq!(page_widths(&out), vec![220, 230, 110]);
    }

    #[test]
    fn test_unreadable_input_is_a_merge_error() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("merged.pdf");
        let err = merge_pdfs(&[dir.path().join("missing.pdf")], &out).unwrap_err();
        assert!(matches!(err, EngineError::Merge { .. }));
        assert!(err.to_string().contains("missing.pdf"));
        assert!(!out.exists());
    }

    #[test]
    fn test_nothing_to_merge() {
        let dir = TempDir::new().unwrap();
        assert!(merge_pdfs(&[], &dir.path().join("merged.pdf")).is_err());
    }
}
