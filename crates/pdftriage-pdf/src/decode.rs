use std::io::Read;

use anyhow::{anyhow, Result};
use tracing::warn;

use crate::object::{PdfAtom, PdfDict};

#[derive(Debug, Clone)]
pub struct DecodedStream {
    pub data: Vec<u8>,
    /// Output hit `max_out` and was cut short.
    pub truncated: bool,
    pub filters: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct Predictor {
    predictor: u32,
    colors: u32,
    bits_per_component: u32,
    columns: u32,
}

const MAX_PREDICTOR_PARAM: u32 = 100_000;
const MAX_FILTER_CHAIN: usize = 8;

/// Runs the filter chain named by `dict` over `raw`. Callers decrypt first.
pub fn decode_stream_data(raw: &[u8], dict: &PdfDict, max_out: usize) -> Result<DecodedStream> {
    let filters = stream_filters(dict);
    if filters.len() > MAX_FILTER_CHAIN {
        warn!(
            security = true,
            domain = "pdf.decode",
            kind = "filter_chain_too_long",
            filters = filters.len(),
            "Filter chain exceeds limit"
        );
        return Err(anyhow!("filter chain of {} entries exceeds limit", filters.len()));
    }
    let parms = predictor_parms(dict, filters.len());
    let mut data = raw.to_vec();
    let mut truncated = false;
    for (idx, filter) in filters.iter().enumerate() {
        let (decoded, cut) = decode_filter(&data, filter, max_out)?;
        data = decoded;
        if let Some(p) = parms.get(idx).copied().flatten() {
            if matches!(filter.as_str(), "FlateDecode" | "Fl" | "LZWDecode" | "LZW") && p.predictor > 1 {
                data = apply_predictor(&data, p)?;
            }
        }
        if cut {
            truncated = true;
            break;
        }
    }
    if data.len() > max_out {
        data.truncate(max_out);
        truncated = true;
    }
    Ok(DecodedStream { data, truncated, filters })
}

/// Filter names without the leading slash, in application order.
pub fn stream_filters(dict: &PdfDict) -> Vec<String> {
    match dict.get(b"/Filter").map(|o| &o.atom) {
        Some(PdfAtom::Name(n)) => vec![n.bare()],
        Some(PdfAtom::Array(items)) => {
            items.iter().filter_map(|o| o.atom.as_name()).map(|n| n.bare()).collect()
        }
        _ => Vec::new(),
    }
}

fn predictor_parms(dict: &PdfDict, filters: usize) -> Vec<Option<Predictor>> {
    let mut out = vec![None; filters.max(1)];
    match dict.get(b"/DecodeParms").map(|o| &o.atom) {
        Some(PdfAtom::Dict(d)) => out[0] = Some(predictor_from_dict(d)),
        Some(PdfAtom::Array(items)) => {
            for (slot, item) in out.iter_mut().zip(items) {
                if let PdfAtom::Dict(d) = &item.atom {
                    *slot = Some(predictor_from_dict(d));
                }
            }
        }
        _ => {}
    }
    out
}

fn predictor_from_dict(dict: &PdfDict) -> Predictor {
    let get = |key: &[u8], default: u32| {
        dict.int(key).and_then(|v| u32::try_from(v).ok()).unwrap_or(default)
    };
    Predictor {
        predictor: get(b"/Predictor", 1),
        colors: get(b"/Colors", 1),
        bits_per_component: get(b"/BitsPerComponent", 8),
        columns: get(b"/Columns", 1),
    }
}

fn apply_predictor(data: &[u8], p: Predictor) -> Result<Vec<u8>> {
    if p.colors > MAX_PREDICTOR_PARAM
        || p.bits_per_component > MAX_PREDICTOR_PARAM
        || p.columns > MAX_PREDICTOR_PARAM
    {
        warn!(
            security = true,
            domain = "pdf.decode",
            kind = "decode_parms_out_of_range",
            colors = p.colors,
            bits = p.bits_per_component,
            columns = p.columns,
            "Decode parameters out of range"
        );
        return Err(anyhow!("decode parms exceed safe limits"));
    }
    if p.bits_per_component != 8 || p.columns == 0 {
        return Ok(data.to_vec());
    }
    // Bounded by the range check above, so this cannot overflow.
    let bpp = (p.colors as usize).max(1);
    let row_len = p.columns as usize * bpp;
    match p.predictor {
        2 => Ok(tiff_predictor(data, bpp, row_len)),
        10..=15 => Ok(png_predictor(data, bpp, row_len)),
        _ => Ok(data.to_vec()),
    }
}

fn tiff_predictor(data: &[u8], bpp: usize, row_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for chunk in data.chunks(row_len) {
        let mut row = chunk.to_vec();
        for i in bpp..row.len() {
            row[i] = row[i].wrapping_add(row[i - bpp]);
        }
        out.extend_from_slice(&row);
    }
    out
}

fn png_predictor(data: &[u8], bpp: usize, row_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_len];
    for chunk in data.chunks(row_len + 1) {
        if chunk.len() < row_len + 1 {
            break;
        }
        let filter = chunk[0];
        let mut row = chunk[1..].to_vec();
        for j in 0..row_len {
            let left = if j >= bpp { row[j - bpp] } else { 0 };
            let up = prev[j];
            let up_left = if j >= bpp { prev[j - bpp] } else { 0 };
            let add = match filter {
                1 => left,
                2 => up,
                3 => ((u16::from(left) + u16::from(up)) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => 0,
            };
            row[j] = row[j].wrapping_add(add);
        }
        out.extend_from_slice(&row);
        prev = row;
    }
    out
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let (a, b, c) = (i16::from(a), i16::from(b), i16::from(c));
    let p = a + b - c;
    let (pa, pb, pc) = ((p - a).abs(), (p - b).abs(), (p - c).abs());
    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

fn decode_filter(data: &[u8], filter: &str, max_out: usize) -> Result<(Vec<u8>, bool)> {
    match filter {
        "FlateDecode" | "Fl" => decode_flate(data, max_out),
        "ASCIIHexDecode" | "AHx" => Ok((decode_ascii_hex(data), false)),
        "ASCII85Decode" | "A85" => Ok((decode_ascii85(data), false)),
        "RunLengthDecode" | "RL" => Ok((decode_run_length(data, max_out), false)),
        "LZWDecode" | "LZW" => decode_lzw(data, max_out),
        other => Err(anyhow!("unsupported filter /{other}")),
    }
}

fn decode_flate(data: &[u8], max_out: usize) -> Result<(Vec<u8>, bool)> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = match decoder.read(&mut buf) {
            Ok(n) => n,
            // Damaged tails are common; keep what inflated cleanly.
            Err(_) if !out.is_empty() => break,
            Err(err) => return Err(err.into()),
        };
        if n == 0 {
            break;
        }
        if out.len() + n > max_out {
            let remaining = max_out.saturating_sub(out.len());
            out.extend_from_slice(&buf[..remaining]);
            return Ok((out, true));
        }
        out.extend_from_slice(&buf[..n]);
    }
    Ok((out, false))
}

fn decode_lzw(data: &[u8], max_out: usize) -> Result<(Vec<u8>, bool)> {
    let mut decoder = weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
    let mut out = Vec::new();
    let mut buf = [0u8; 8192];
    let mut input = data;
    loop {
        let res = decoder.decode_bytes(input, &mut buf);
        input = &input[res.consumed_in..];
        out.extend_from_slice(&buf[..res.consumed_out]);
        if out.len() > max_out {
            out.truncate(max_out);
            return Ok((out, true));
        }
        match res.status {
            Ok(weezl::LzwStatus::Ok) if res.consumed_in > 0 || res.consumed_out > 0 => continue,
            Ok(_) => break,
            Err(_) if !out.is_empty() => break,
            Err(err) => return Err(anyhow!("lzw decode failed: {err}")),
        }
    }
    Ok((out, false))
}

pub fn decode_ascii_hex(data: &[u8]) -> Vec<u8> {
    let mut nibbles: Vec<u8> = data
        .iter()
        .take_while(|&&b| b != b'>')
        .filter_map(|&b| crate::lexer::hex_digit(b))
        .collect();
    if nibbles.len() % 2 == 1 {
        nibbles.push(0);
    }
    nibbles.chunks_exact(2).map(|pair| (pair[0] << 4) | pair[1]).collect()
}

fn decode_ascii85(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut tuple = Vec::with_capacity(5);
    let mut i = 0usize;
    while i < data.len() {
        let b = data[i];
        i += 1;
        if b == b'~' {
            break;
        }
        if b == b'z' && tuple.is_empty() {
            out.extend_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        if !(b'!'..=b'u').contains(&b) {
            continue;
        }
        tuple.push(u64::from(b - b'!'));
        if tuple.len() == 5 {
            let value = tuple.iter().fold(0u64, |acc, d| acc * 85 + d);
            out.extend_from_slice(&(value as u32).to_be_bytes());
            tuple.clear();
        }
    }
    if tuple.len() > 1 {
        let kept = tuple.len() - 1;
        tuple.resize(5, 84);
        let value = tuple.iter().fold(0u64, |acc, d| acc * 85 + d);
        out.extend_from_slice(&(value as u32).to_be_bytes()[..kept]);
    }
    out
}

fn decode_run_length(data: &[u8], max_out: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < data.len() && out.len() < max_out {
        let n = data[i];
        i += 1;
        match n {
            128 => break,
            0..=127 => {
                let count = usize::from(n) + 1;
                let Some(run) = data.get(i..i + count) else {
                    break;
                };
                out.extend_from_slice(run);
                i += count;
            }
            _ => {
                let Some(&b) = data.get(i) else {
                    break;
                };
                out.extend(std::iter::repeat(b).take(257 - usize::from(n)));
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::parser::Parser;

    fn dict(src: &str) -> PdfDict {
        let obj = Parser::new(src.as_bytes(), 0).parse_object().expect("dict");
        obj.atom.as_dict().cloned().expect("dict")
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).expect("write");
        enc.finish().expect("finish")
    }

    #[test]
    fn flate_round_trip_through_filter_array() {
        let packed = zlib(b"1 0 obj");
        let hex: String = packed.iter().map(|b| format!("{b:02x}")).collect();
        let decoded = decode_stream_data(
            format!("{hex}>").as_bytes(),
            &dict("<< /Filter [/AHx /Fl] >>"),
            1024,
        )
        .expect("decode");
        assert_eq!(decoded.data, b"1 0 obj".to_vec());
        assert_eq!(decoded.filters, vec!["AHx".to_string(), "Fl".to_string()]);
    }

    #[test]
    fn flate_output_is_capped() {
        let packed = zlib(&vec![b'a'; 10_000]);
        let decoded =
            decode_stream_data(&packed, &dict("<< /Filter /FlateDecode >>"), 100).expect("decode");
        assert!(decoded.truncated);
        assert_eq!(decoded.data.len(), 100);
    }

    #[test]
    fn png_up_predictor_is_reversed() {
        // Two rows of three bytes, second row uses the Up filter.
        let raw = [0u8, 1, 2, 3, 2, 1, 1, 1];
        let packed = zlib(&raw);
        let decoded = decode_stream_data(
            &packed,
            &dict("<< /Filter /FlateDecode /DecodeParms << /Predictor 12 /Columns 3 >> >>"),
            1024,
        )
        .expect("decode");
        assert_eq!(decoded.data, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn ascii85_handles_partial_group() {
        assert_eq!(decode_ascii85(b"87cURD]i,\"Ebo7~>"), b"Hello World".to_vec());
    }

    #[test]
    fn unknown_filter_is_an_error() {
        assert!(decode_stream_data(b"x", &dict("<< /Filter /JBIG2Decode >>"), 16).is_err());
    }
}
