//! Server-rendered gallery page.

use std::fmt::Write;

use url::Url;

use crate::gallery::ImageFile;
use crate::naming;

const API: &str = "/api/v1";

const STYLE: &str = r#"
body { font-family: Arial, sans-serif; margin: 20px; background-color: #f0f0f0; }
h1, h2 { color: #333; text-align: center; }
.info { text-align: center; margin: 20px 0; padding: 15px; background-color: #4CAF50; color: white; border-radius: 5px; }
.controls, .live-feed { text-align: center; margin: 20px 0; }
.live-feed { padding: 20px; background-color: white; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
.live-feed img { max-width: 100%; border: 2px solid #333; border-radius: 4px; }
button { padding: 10px 20px; font-size: 16px; margin: 5px; cursor: pointer; background-color: #008CBA; color: white; border: none; border-radius: 4px; }
button:hover { background-color: #007399; }
.gallery { display: grid; grid-template-columns: repeat(auto-fill, minmax(300px, 1fr)); gap: 20px; margin-top: 20px; }
.image-card { background-color: white; border-radius: 8px; padding: 10px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
.image-card img { width: 100%; height: auto; border-radius: 4px; cursor: pointer; }
.image-info { margin-top: 10px; font-size: 12px; color: #666; word-break: break-all; }
.image-actions { margin-top: 10px; display: flex; gap: 5px; flex-wrap: wrap; }
.btn-delete { background-color: #f44336; padding: 5px 10px; font-size: 12px; }
.btn-rename { background-color: #ff9800; padding: 5px 10px; font-size: 12px; }
.no-images { text-align: center; padding: 40px; color: #999; }
"#;

const SCRIPT: &str = r#"
const API = '/api/v1';

async function call(method, path) {
    const resp = await fetch(API + path, { method });
    const data = await resp.json().catch(() => ({}));
    if (!resp.ok || data.success === false) {
        throw new Error(data.message || ('HTTP ' + resp.status));
    }
    return data;
}

function captureImage() {
    call('POST', '/camera/capture')
        .then(() => location.reload())
        .catch(e => alert('Capture failed: ' + e.message));
}

function renameImage(button) {
    const name = button.dataset.name;
    const label = prompt('Enter new label for ' + name + ':', '');
    if (!label || !label.trim()) {
        return;
    }
    call('POST', '/camera/images/' + encodeURIComponent(name) + '/rename?new_label=' + encodeURIComponent(label.trim()))
        .then(data => { alert('Image renamed to: ' + data.new_filename); location.reload(); })
        .catch(e => alert('Error renaming image: ' + e.message));
}

function deleteImage(button) {
    const name = button.dataset.name;
    if (!confirm('Are you sure you want to delete ' + name + '?')) {
        return;
    }
    call('DELETE', '/camera/images/' + encodeURIComponent(name))
        .then(() => location.reload())
        .catch(e => alert('Error deleting image: ' + e.message));
}

function refreshLive() {
    document.getElementById('liveImage').src = API + '/camera/stream?t=' + Date.now();
}

setInterval(refreshLive, 5000);
"#;

/// Render the gallery page for `images` (already in display order).
pub fn render(images: &[ImageFile], camera_host: &str) -> String {
    let mut html = String::with_capacity(4096 + images.len() * 512);
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Camera Captures</title>
<style>{STYLE}</style>
<script>{SCRIPT}</script>
</head>
<body>
<h1>Camera Captures</h1>
<div class="info">
<strong>Camera:</strong> {host}<br>
<strong>Total Captures:</strong> {total} images
</div>
<div class="live-feed">
<h2>Live Camera Feed</h2>
<img id="liveImage" src="{API}/camera/stream" alt="Live camera" onerror="this.style.display='none'" onload="this.style.display='inline'">
<br><br>
<button onclick="captureImage()">Capture New Image</button>
</div>
<div class="controls">
<button onclick="location.reload()">Refresh Gallery</button>
</div>
<h2>Captured Images</h2>
"#,
        host = escape(camera_host),
        total = images.len(),
    );

    if images.is_empty() {
        html.push_str(
            r#"<div class="no-images">No images captured yet. Click "Capture New Image" above to start!</div>"#,
        );
    } else {
        html.push_str(r#"<div class="gallery">"#);
        for img in images {
            card(&mut html, img);
        }
        html.push_str("</div>");
    }

    html.push_str("\n</body>\n</html>\n");
    html
}

fn card(html: &mut String, img: &ImageFile) {
    let name = escape(&img.filename);
    let href = escape(&image_href(&img.filename));
    let parsed = naming::parse_name(&img.filename);
    let label = parsed
        .label
        .as_deref()
        .map(|l| format!("Label: {}<br>\n", escape(l)))
        .unwrap_or_default();
    let _ = write!(
        html,
        r#"
<div class="image-card">
<a href="{href}" target="_blank"><img src="{href}" alt="{name}" loading="lazy"></a>
<div class="image-info">
<strong>{name}</strong><br>
Time: {time}<br>
{label}Size: {kb:.1} KB
</div>
<div class="image-actions">
<button class="btn-rename" data-name="{name}" onclick="renameImage(this)">Rename</button>
<button class="btn-delete" data-name="{name}" onclick="deleteImage(this)">Delete</button>
</div>
</div>"#,
        time = escape(&parsed.timestamp),
        kb = img.size_bytes as f64 / 1024.0,
    );
}

/// Path of the API route serving `filename`, percent-encoded.
fn image_href(filename: &str) -> String {
    let Ok(mut url) = Url::parse("http://gateway/") else {
        return String::new();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments
            .clear()
            .extend(["api", "v1", "camera", "images", filename]);
    }
    url.path().to_string()
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&'  => out.push_str("&amp;"),
            '<'  => out.push_str("&lt;"),
            '>'  => out.push_str("&gt;"),
            '"'  => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _    => out.push(c),
        }
    }
    out
}
