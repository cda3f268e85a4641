//! Standard security handler, RC4 revisions 2 to 4.
//!
//! AES crypt filters and the revision 5/6 handler are recognised but not
//! decrypted; they surface as [`Unlock::Unsupported`].

use tracing::debug;

use crate::object::{ObjRef, PdfDict};

pub const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Parsed `/Encrypt` dictionary of a supported standard handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptParams {
    pub revision: u8,
    /// File key length in bytes.
    pub key_len: usize,
    pub owner_entry: Vec<u8>,
    pub user_entry: Vec<u8>,
    pub permissions: u32,
    pub encrypt_metadata: bool,
}

impl EncryptParams {
    /// Reads the handler parameters; the error names what is not supported.
    pub fn from_dict(dict: &PdfDict) -> Result<Self, String> {
        match dict.name(b"/Filter") {
            Some(n) if n.is(b"/Standard") => {}
            Some(n) => return Err(format!("security handler /{}", n.bare())),
            None => return Err("security handler without /Filter".into()),
        }
        let version = dict.int(b"/V").unwrap_or(0);
        let revision = dict.int(b"/R").unwrap_or(0);
        let mut key_len = match version {
            1 => 5,
            2 => length_in_bytes(dict.int(b"/Length").unwrap_or(40))?,
            4 => crypt_filter_key_len(dict)?,
            5 => return Err("AES-256 encryption (V5)".into()),
            other => return Err(format!("encryption algorithm V{other}")),
        };
        let revision = match revision {
            2..=4 => revision as u8,
            other => return Err(format!("standard security handler revision {other}")),
        };
        if revision == 2 {
            key_len = 5;
        }
        let owner_entry = dict.string(b"/O").map(|s| s.bytes.clone()).unwrap_or_default();
        let user_entry = dict.string(b"/U").map(|s| s.bytes.clone()).unwrap_or_default();
        if owner_entry.len() < 32 || user_entry.len() < 32 {
            return Err("malformed /O or /U entry".into());
        }
        Ok(Self {
            revision,
            key_len,
            owner_entry: owner_entry[..32].to_vec(),
            user_entry: user_entry[..32].to_vec(),
            permissions: dict.int(b"/P").unwrap_or(0) as u32,
            encrypt_metadata: revision < 4 || dict.boolean(b"/EncryptMetadata").unwrap_or(true),
        })
    }
}

fn length_in_bytes(bits: i64) -> Result<usize, String> {
    match bits {
        40..=128 if bits % 8 == 0 => Ok((bits / 8) as usize),
        other => Err(format!("key length of {other} bits")),
    }
}

fn crypt_filter_key_len(dict: &PdfDict) -> Result<usize, String> {
    let filter_name = dict.name(b"/StmF").or_else(|| dict.name(b"/StrF"));
    if filter_name.is_some_and(|n| n.is(b"/Identity")) {
        return Err("identity crypt filter".into());
    }
    let std_cf = dict
        .get(b"/CF")
        .and_then(|cf| cf.atom.as_dict())
        .and_then(|cf| cf.get(b"/StdCF"))
        .and_then(|f| f.atom.as_dict())
        .ok_or_else(|| "crypt filter dictionary missing /StdCF".to_string())?;
    match std_cf.name(b"/CFM") {
        Some(m) if m.is(b"/V2") => {}
        Some(m) => return Err(format!("crypt filter method /{}", m.bare())),
        None => return Err("crypt filter without /CFM".into()),
    }
    // /Length in a crypt filter is specified in bytes, but some writers use bits.
    match std_cf.int(b"/Length") {
        None => Ok(16),
        Some(n @ 5..=16) => Ok(n as usize),
        Some(bits) => length_in_bytes(bits),
    }
}

/// Decryption state once a credential has been accepted.
#[derive(Debug, Clone)]
pub struct StandardSecurity {
    key: Vec<u8>,
    revision: u8,
    owner_authenticated: bool,
}

impl StandardSecurity {
    pub fn revision(&self) -> u8 {
        self.revision
    }

    pub fn owner_authenticated(&self) -> bool {
        self.owner_authenticated
    }

    pub fn object_key(&self, reference: ObjRef) -> Vec<u8> {
        let mut input = self.key.clone();
        input.extend_from_slice(&reference.obj.to_le_bytes()[..3]);
        input.extend_from_slice(&reference.gen.to_le_bytes());
        let n = (self.key.len() + 5).min(16);
        md5::compute(&input).0[..n].to_vec()
    }

    pub fn decrypt(&self, reference: ObjRef, data: &[u8]) -> Vec<u8> {
        rc4(&self.object_key(reference), data)
    }
}

#[derive(Debug, Clone)]
pub enum Unlock {
    Unlocked(StandardSecurity),
    WrongPassword,
    Unsupported(String),
}

/// Authenticates `password` as the user password, then as the owner
/// password. Without a password only the empty user password is tried.
pub fn unlock(encrypt: &PdfDict, file_id: &[u8], password: Option<&[u8]>) -> Unlock {
    let params = match EncryptParams::from_dict(encrypt) {
        Ok(p) => p,
        Err(reason) => return Unlock::Unsupported(reason),
    };
    let candidate = password.unwrap_or_default();
    let key = compute_file_key(candidate, &params, file_id);
    if user_key_matches(&key, &params, file_id) {
        debug!(revision = params.revision, "Authenticated with user password");
        return Unlock::Unlocked(StandardSecurity {
            key,
            revision: params.revision,
            owner_authenticated: false,
        });
    }
    if password.is_some() {
        let user_password = recover_user_password(candidate, &params);
        let key = compute_file_key(&user_password, &params, file_id);
        if user_key_matches(&key, &params, file_id) {
            debug!(revision = params.revision, "Authenticated with owner password");
            return Unlock::Unlocked(StandardSecurity {
                key,
                revision: params.revision,
                owner_authenticated: true,
            });
        }
    }
    Unlock::WrongPassword
}

pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut out = PASSWORD_PADDING;
    let n = password.len().min(32);
    out[..n].copy_from_slice(&password[..n]);
    out[n..].copy_from_slice(&PASSWORD_PADDING[..32 - n]);
    out
}

/// File encryption key from a user password.
pub fn compute_file_key(password: &[u8], params: &EncryptParams, file_id: &[u8]) -> Vec<u8> {
    let mut input = pad_password(password).to_vec();
    input.extend_from_slice(&params.owner_entry);
    input.extend_from_slice(&params.permissions.to_le_bytes());
    input.extend_from_slice(file_id);
    if params.revision >= 4 && !params.encrypt_metadata {
        input.extend_from_slice(&[0xff; 4]);
    }
    let n = params.key_len.min(16);
    let mut digest = md5::compute(&input).0;
    if params.revision >= 3 {
        for _ in 0..50 {
            digest = md5::compute(&digest[..n]).0;
        }
    }
    digest[..n].to_vec()
}

/// Value of `/U` for a file key. Revisions 3+ only define the first 16 bytes.
pub fn compute_user_entry(file_key: &[u8], revision: u8, file_id: &[u8]) -> Vec<u8> {
    if revision == 2 {
        return rc4(file_key, &PASSWORD_PADDING);
    }
    let mut input = PASSWORD_PADDING.to_vec();
    input.extend_from_slice(file_id);
    let mut x = rc4(file_key, &md5::compute(&input).0);
    for i in 1..=19u8 {
        x = rc4(&xor_key(file_key, i), &x);
    }
    x.resize(32, 0);
    x
}

/// Value of `/O`. An empty owner password falls back to the user password.
pub fn compute_owner_entry(owner: &[u8], user: &[u8], revision: u8, key_len: usize) -> Vec<u8> {
    let owner = if owner.is_empty() { user } else { owner };
    let key = owner_rc4_key(owner, revision, key_len);
    let mut x = rc4(&key, &pad_password(user));
    if revision >= 3 {
        for i in 1..=19u8 {
            x = rc4(&xor_key(&key, i), &x);
        }
    }
    x
}

fn user_key_matches(key: &[u8], params: &EncryptParams, file_id: &[u8]) -> bool {
    let expected = compute_user_entry(key, params.revision, file_id);
    let n = if params.revision == 2 { 32 } else { 16 };
    expected[..n] == params.user_entry[..n]
}

fn owner_rc4_key(owner: &[u8], revision: u8, key_len: usize) -> Vec<u8> {
    let mut digest = md5::compute(pad_password(owner)).0;
    if revision >= 3 {
        for _ in 0..50 {
            digest = md5::compute(digest).0;
        }
    }
    let n = if revision == 2 { 5 } else { key_len.min(16) };
    digest[..n].to_vec()
}

fn recover_user_password(owner: &[u8], params: &EncryptParams) -> Vec<u8> {
    let key = owner_rc4_key(owner, params.revision, params.key_len);
    if params.revision == 2 {
        return rc4(&key, &params.owner_entry);
    }
    let mut x = params.owner_entry.clone();
    for i in (0..=19u8).rev() {
        x = rc4(&xor_key(&key, i), &x);
    }
    x
}

fn xor_key(key: &[u8], i: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ i).collect()
}

pub fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    let mut s: [u8; 256] = std::array::from_fn(|i| i as u8);
    let mut j = 0u8;
    for i in 0..256 {
        j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
        s.swap(i, j as usize);
    }
    let (mut i, mut j) = (0u8, 0u8);
    data.iter()
        .map(|&byte| {
            i = i.wrapping_add(1);
            j = j.wrapping_add(s[i as usize]);
            s.swap(i as usize, j as usize);
            byte ^ s[s[i as usize].wrapping_add(s[j as usize]) as usize]
        })
        .collect()
}
