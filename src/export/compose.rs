use crate::controller::view::RecordView;
use crate::record::Record;
use crate::schema::RecordType;

const PAGE_WIDTH: u32 = 612;
const PAGE_HEIGHT: u32 = 792;
const MARGIN: f32 = 54.0;
const LINE_HEIGHT: f32 = 16.0;
const BODY_SIZE: u32 = 11;
const TITLE_SIZE: u32 = 14;
const ROW_INDENT: f32 = 18.0;

// printable rows between the top and bottom margins
const LINES_PER_PAGE: usize =
    ((PAGE_HEIGHT as f32 - 2.0 * MARGIN - LINE_HEIGHT) / LINE_HEIGHT) as usize;

struct Line {
    text: String,
    size: u32,
    indent: f32,
}

/// Composes a complete paginated PDF for one record, emitting label/value
/// lines in schema section order and starting a new page whenever the
/// vertical cursor would pass the printable height. Pure function of the
/// record; always succeeds.
pub fn compose_pdf(record_type: &RecordType, record: &Record) -> Vec<u8> {
    let lines = layout(record_type, record);
    let pages: Vec<&[Line]> = if lines.is_empty() {
        Vec::new()
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };
    render(&pages)
}

fn layout(record_type: &RecordType, record: &Record) -> Vec<Line> {
    let mut lines = Vec::new();
    let title = match record.id.as_deref() {
        Some(id) => format!("{} #{id}", record_type.label),
        None => record_type.label.to_string(),
    };
    lines.push(Line {
        text: title,
        size: TITLE_SIZE,
        indent: 0.0,
    });
    lines.push(Line {
        text: String::new(),
        size: BODY_SIZE,
        indent: 0.0,
    });
    for (label, value) in RecordView::new(*record_type, record.clone()).lines() {
        if label.is_empty() {
            lines.push(Line {
                text: value,
                size: BODY_SIZE,
                indent: ROW_INDENT,
            });
        } else {
            lines.push(Line {
                text: format!("{label}: {value}"),
                size: BODY_SIZE,
                indent: 0.0,
            });
        }
    }
    lines
}

fn render(pages: &[&[Line]]) -> Vec<u8> {
    let page_count = pages.len().max(1);
    let mut bodies: Vec<Vec<u8>> = Vec::with_capacity(3 + page_count * 2);

    bodies.push(b"<< /Type /Catalog /Pages 2 0 R >>".to_vec());
    let kids = (0..page_count)
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");
    bodies.push(format!("<< /Type /Pages /Kids [{kids}] /Count {page_count} >>").into_bytes());
    bodies.push(b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_vec());

    for i in 0..page_count {
        let content_obj = 5 + 2 * i;
        bodies.push(
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {content_obj} 0 R >>"
            )
            .into_bytes(),
        );
        let stream = page_stream(pages.get(i).copied().unwrap_or(&[]));
        let mut body = format!("<< /Length {} >>\nstream\n", stream.len()).into_bytes();
        body.extend_from_slice(stream.as_bytes());
        body.extend_from_slice(b"\nendstream");
        bodies.push(body);
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(bodies.len());
    for (i, body) in bodies.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", bodies.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
            bodies.len() + 1
        )
        .as_bytes(),
    );
    out
}

fn page_stream(lines: &[Line]) -> String {
    let mut stream = String::new();
    let top = PAGE_HEIGHT as f32 - MARGIN - LINE_HEIGHT;
    for (i, line) in lines.iter().enumerate() {
        if line.text.is_empty() {
            continue;
        }
        let x = MARGIN + line.indent;
        let y = top - i as f32 * LINE_HEIGHT;
        stream.push_str(&format!(
            "BT /F1 {} Tf {x} {y} Td ({}) Tj ET\n",
            line.size,
            escape_text(&line.text)
        ));
    }
    stream
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' | '\r' => out.push(' '),
            ch => out.push(ch),
        }
    }
    out
}
