//! Minimal server-rendered pages: the pairing QR code and the optional HTML
//! view of the message log.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use qrcode::render::svg;
use qrcode::QrCode;

use crate::bridge::MessageRecord;

fn shell(title: &str, body: &str, refresh_seconds: Option<u32>) -> String {
    let refresh = refresh_seconds
        .map(|s| format!(r#"<meta http-equiv="refresh" content="{s}">"#))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
<meta charset="utf-8">
{refresh}
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 640px; margin: 40px auto; text-align: center; }}
table {{ border-collapse: collapse; width: 100%; text-align: left; }}
td, th {{ border: 1px solid #ccc; padding: 6px 10px; }}
.sent {{ color: #128c7e; }}
</style>
</head>
<body>
{body}
</body>
</html>"#
    )
}

pub fn qr_connected() -> String {
    shell(
        "wabridge",
        "<h1>Conectado ao WhatsApp</h1><p>Nenhum pareamento pendente.</p>",
        None,
    )
}

pub fn qr_waiting() -> String {
    shell(
        "wabridge",
        "<h1>Aguardando QR code...</h1><p>A página recarrega automaticamente.</p>",
        Some(3),
    )
}

pub fn qr_pairing(code: &str) -> String {
    let body = match qr_data_url(code) {
        Some(url) => format!(
            r#"<h1>Escaneie para parear</h1>
<img src="{url}" alt="QR code" width="300" height="300">
<p>WhatsApp &gt; Aparelhos conectados &gt; Conectar um aparelho</p>"#
        ),
        // Unrenderable payload; show it raw so pairing is still possible.
        None => format!("<h1>QR code</h1><pre>{}</pre>", escape(code)),
    };
    shell("wabridge - pareamento", &body, Some(20))
}

fn qr_data_url(code: &str) -> Option<String> {
    let qr = QrCode::new(code.as_bytes()).ok()?;
    let image = qr.render::<svg::Color>().min_dimensions(300, 300).build();
    Some(format!("data:image/svg+xml;base64,{}", BASE64.encode(image)))
}

pub fn messages_table(records: &[MessageRecord]) -> String {
    let rows: String = records
        .iter()
        .map(|r| {
            let class = if r.from_me { " class=\"sent\"" } else { "" };
            format!(
                "<tr{class}><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                escape(&r.push_name),
                escape(&r.from_number),
                escape(&r.text),
            )
        })
        .collect();
    let body = format!(
        "<h1>Mensagens ({})</h1>\n<table>\n<tr><th>Data</th><th>Nome</th><th>Número</th><th>Mensagem</th></tr>\n{rows}</table>",
        records.len()
    );
    shell("wabridge - mensagens", &body, None)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
