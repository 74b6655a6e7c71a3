// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! FastCGI record framing.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const FCGI_VERSION: u8 = 1;
pub const FCGI_RESPONDER: u16 = 1;
pub const MAX_CONTENT_LEN: usize = 65535;
pub const HEADER_LEN: usize = 8;

/// Record request id; one request per connection.
pub const REQUEST_ID: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    BeginRequest = 1,
    AbortRequest = 2,
    EndRequest = 3,
    Params = 4,
    Stdin = 5,
    Stdout = 6,
    Stderr = 7,
    Data = 8,
    GetValues = 9,
    GetValuesResult = 10,
    UnknownType = 11,
}

impl RecordType {
    pub fn from_u8(value: u8) -> Option<Self> {
        let t = match value {
            1 => RecordType::BeginRequest,
            2 => RecordType::AbortRequest,
            3 => RecordType::EndRequest,
            4 => RecordType::Params,
            5 => RecordType::Stdin,
            6 => RecordType::Stdout,
            7 => RecordType::Stderr,
            8 => RecordType::Data,
            9 => RecordType::GetValues,
            10 => RecordType::GetValuesResult,
            11 => RecordType::UnknownType,
            _ => return None,
        };
        Some(t)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub version: u8,
    pub record_type: u8,
    pub request_id: u16,
    pub content_length: u16,
    pub padding_length: u8,
}

impl RecordHeader {
    pub fn new(record_type: RecordType, content_length: usize) -> Self {
        Self {
            version: FCGI_VERSION,
            record_type: record_type as u8,
            request_id: REQUEST_ID,
            content_length: content_length as u16,
            padding_length: padding_for(content_length),
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let id = self.request_id.to_be_bytes();
        let len = self.content_length.to_be_bytes();
        [
            self.version,
            self.record_type,
            id[0],
            id[1],
            len[0],
            len[1],
            self.padding_length,
            0,
        ]
    }

    pub fn decode(buf: &[u8; HEADER_LEN]) -> Self {
        Self {
            version: buf[0],
            record_type: buf[1],
            request_id: u16::from_be_bytes([buf[2], buf[3]]),
            content_length: u16::from_be_bytes([buf[4], buf[5]]),
            padding_length: buf[6],
        }
    }
}

/// Pad record content to an 8-byte boundary.
fn padding_for(content_length: usize) -> u8 {
    ((8 - (content_length % 8)) % 8) as u8
}

/// A decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub header: RecordHeader,
    pub content: Vec<u8>,
}

impl Record {
    pub fn record_type(&self) -> Option<RecordType> {
        RecordType::from_u8(self.header.record_type)
    }
}

/// Body of a BEGIN_REQUEST record for the responder role.
pub fn begin_request_body(keep_conn: bool) -> [u8; 8] {
    let role = FCGI_RESPONDER.to_be_bytes();
    [role[0], role[1], u8::from(keep_conn), 0, 0, 0, 0, 0]
}

fn encode_length(buf: &mut Vec<u8>, len: usize) {
    if len < 128 {
        buf.push(len as u8);
    } else {
        buf.extend_from_slice(&((len as u32) | 0x8000_0000).to_be_bytes());
    }
}

/// Encode name-value pairs into PARAMS content.
pub fn encode_params<'a, I>(pairs: I) -> Vec<u8>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut buf = Vec::new();
    for (name, value) in pairs {
        encode_length(&mut buf, name.len());
        encode_length(&mut buf, value.len());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(value.as_bytes());
    }
    buf
}

/// Decode PARAMS content back into pairs.
pub fn decode_params(mut data: &[u8]) -> io::Result<Vec<(String, String)>> {
    fn read_len(data: &mut &[u8]) -> io::Result<usize> {
        let d: &[u8] = *data;
        let first = *d
            .first()
            .ok_or_else(|| invalid_data("truncated name-value length"))?;
        if first & 0x80 == 0 {
            *data = &d[1..];
            return Ok(first as usize);
        }
        if d.len() < 4 {
            return Err(invalid_data("truncated name-value length"));
        }
        let len = u32::from_be_bytes([d[0] & 0x7f, d[1], d[2], d[3]]);
        *data = &d[4..];
        Ok(len as usize)
    }

    let mut pairs = Vec::new();
    while !data.is_empty() {
        let name_len = read_len(&mut data)?;
        let value_len = read_len(&mut data)?;
        if data.len() < name_len + value_len {
            return Err(invalid_data("truncated name-value pair"));
        }
        let name = String::from_utf8_lossy(&data[..name_len]).into_owned();
        let value = String::from_utf8_lossy(&data[name_len..name_len + value_len]).into_owned();
        data = &data[name_len + value_len..];
        pairs.push((name, value));
    }

    Ok(pairs)
}

pub async fn write_record<W>(w: &mut W, record_type: RecordType, content: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let header = RecordHeader::new(record_type, content.len());
    w.write_all(&header.encode()).await?;
    w.write_all(content).await?;
    if header.padding_length > 0 {
        w.write_all(&[0u8; 8][..header.padding_length as usize]).await?;
    }
    Ok(())
}

/// Write a stream (PARAMS, STDIN) split into records and closed by an empty record.
pub async fn write_stream<W>(w: &mut W, record_type: RecordType, content: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for chunk in content.chunks(MAX_CONTENT_LEN) {
        write_record(w, record_type, chunk).await?;
    }
    write_record(w, record_type, &[]).await
}

/// Read one record. A clean EOF before the header yields `UnexpectedEof`.
pub async fn read_record<R>(r: &mut R) -> io::Result<Record>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; HEADER_LEN];
    r.read_exact(&mut header_buf).await?;
    let header = RecordHeader::decode(&header_buf);

    if header.version != FCGI_VERSION {
        return Err(invalid_data("unsupported FastCGI record version"));
    }

    let mut content = vec![0u8; header.content_length as usize];
    r.read_exact(&mut content).await?;

    if header.padding_length > 0 {
        let mut padding = vec![0u8; header.padding_length as usize];
        r.read_exact(&mut padding).await?;
    }

    Ok(Record { header, content })
}

fn invalid_data(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}
