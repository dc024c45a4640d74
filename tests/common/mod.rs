//! Builders for synthetic PDBF files.
//!
//! Plaintext is assembled with [`Writer`], offset-table slots are marked
//! with [`Container::mark`], and [`Container::seal`] lays out the header
//! and encrypts with the standard XOR scheme.

#![allow(dead_code)]

use pdbf::cursor::encode_string;

pub const KEY: u32 = 0xA5C3_1E77;
pub const BLOCK_SIZE: usize = 4096;
pub const ONE: i32 = 1 << 16;

// ── Writer ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Writer {
    pub buf: Vec<u8>,
}

#[derive(Clone, Copy, Default)]
pub struct ObjectFlags {
    pub named:        bool,
    pub unk_property: bool,
    pub prism:        bool,
    /// Circuit faces with a zero normal store only a reserved dword.
    pub circuit:      bool,
}

#[derive(Clone)]
pub struct Face {
    pub vertices:         u32,
    pub indices:          [u32; 4],
    pub normal:           [i32; 3],
    pub material:         &'static str,
    pub color_or_texture: u32,
    pub uvs:              [(u32, u32); 4],
    pub visible:          bool,
}

impl Face {
    pub fn tri(material: &'static str, key: u32) -> Self {
        Face {
            vertices:         3,
            indices:          [0, 1, 2, 0],
            normal:           [0, ONE, 0],
            material,
            color_or_texture: key,
            uvs:              [(0, 0), (255, 0), (255, 255), (0, 255)],
            visible:          true,
        }
    }

    pub fn quad(material: &'static str, key: u32) -> Self {
        Face { vertices: 4, indices: [0, 1, 2, 3], ..Face::tri(material, key) }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// Unit square in the file's x/y plane.
pub const SQUARE: [[i32; 3]; 4] = [[0, 0, 0], [ONE, 0, 0], [ONE, ONE, 0], [0, ONE, 0]];

impl Writer {
    pub fn len(&self) -> usize { self.buf.len() }
    pub fn u8(&mut self, v: u8) -> &mut Self { self.buf.push(v); self }
    pub fn u16(&mut self, v: u16) -> &mut Self { self.buf.extend_from_slice(&v.to_le_bytes()); self }
    pub fn u32(&mut self, v: u32) -> &mut Self { self.buf.extend_from_slice(&v.to_le_bytes()); self }
    pub fn i32(&mut self, v: i32) -> &mut Self { self.buf.extend_from_slice(&v.to_le_bytes()); self }
    pub fn bytes(&mut self, b: &[u8]) -> &mut Self { self.buf.extend_from_slice(b); self }
    pub fn zeros(&mut self, n: usize) -> &mut Self { self.buf.resize(self.buf.len() + n, 0); self }
    pub fn string(&mut self, s: &str) -> &mut Self { self.buf.extend(encode_string(s)); self }

    pub fn fixed3(&mut self, v: [i32; 3]) -> &mut Self {
        for c in v {
            self.i32(c);
        }
        self
    }

    pub fn identity_rotation(&mut self) -> &mut Self {
        self.fixed3([ONE, 0, 0]).fixed3([0, ONE, 0]).fixed3([0, 0, ONE])
    }

    /// `count` pages of `width × height` pixels all set to `fill`, one
    /// image record per page.
    pub fn texture_list(&mut self, count: u32, width: usize, height: usize, fill: u16) -> &mut Self {
        self.u32(count).u32(0);
        for i in 0..count {
            self.u32(1);
            let mut name = [0u8; 32];
            let label = format!("page{i}.bmp");
            name[..label.len()].copy_from_slice(label.as_bytes());
            self.bytes(&name).u32(0).u32(0).u32(width as u32).u32(height as u32).u32(0);
        }
        for _ in 0..count {
            for _ in 0..width * height {
                self.u16(fill);
            }
        }
        self
    }

    pub fn face(&mut self, f: &Face, flags: ObjectFlags) -> &mut Self {
        if flags.named {
            self.string("face");
        }
        self.u32(f.vertices);
        for i in f.indices {
            self.u32(i);
        }
        self.fixed3(f.normal).string(f.material).u32(f.color_or_texture);
        for (u, v) in f.uvs {
            self.u32(u).u32(v);
        }
        self.u32(0);
        if f.vertices == 4 {
            self.fixed3([0; 3]);
        }
        if flags.circuit && f.normal == [0, 0, 0] {
            self.u32(0);
        } else {
            if flags.unk_property {
                self.u32(0);
            }
            self.u32(f.visible as u32);
        }
        self
    }

    pub fn object(&mut self, vertices: &[[i32; 3]], faces: &[Face], flags: ObjectFlags) -> &mut Self {
        self.u32(vertices.len() as u32);
        for &v in vertices {
            self.fixed3(v);
        }
        let tris = faces.iter().filter(|f| f.vertices == 3).count() as u32;
        self.u32(faces.len() as u32).u32(tris).u32(faces.len() as u32 - tris);
        for f in faces {
            self.face(f, flags);
        }
        for _ in vertices {
            self.fixed3([0, 0, ONE]);
        }
        self.u32(0);
        if flags.prism {
            self.zeros(28);
        }
        self
    }
}

// ── Container ────────────────────────────────────────────────────────────────

/// Plaintext body plus the body positions the offset table points at.
#[derive(Default)]
pub struct Container {
    pub body:  Writer,
    pub slots: Vec<usize>,
}

impl Container {
    pub fn with_slots(count: usize) -> Self {
        Container { body: Writer::default(), slots: vec![0; count] }
    }

    /// Point slot `index` at the current end of the body.
    pub fn mark(&mut self, index: usize) {
        self.slots[index] = self.body.len();
    }

    pub fn seal(&self, block_size: usize) -> Vec<u8> {
        let header_len = 8 + 4 * self.slots.len();
        let data_len = block_size - 4;
        let mut plain = Writer::default();
        plain.i32(0).i32(self.slots.len() as i32);
        for &pos in &self.slots {
            let p = header_len + pos;
            plain.i32((p + (p / data_len) * 4) as i32);
        }
        plain.bytes(&self.body.buf);
        seal(&plain.buf, KEY, block_size)
    }
}

/// Pad `plain` to whole blocks, store the file length in its first dword
/// and encrypt every block with `key`.
pub fn seal(plain: &[u8], key: u32, block_size: usize) -> Vec<u8> {
    let data_len = block_size - 4;
    let blocks = plain.len().div_ceil(data_len).max(1);
    let mut plain = plain.to_vec();
    plain.resize(blocks * data_len, 0);
    let total = (blocks * block_size) as u32;
    plain[..4].copy_from_slice(&total.to_le_bytes());

    let mut out = Vec::with_capacity(blocks * block_size);
    for chunk in plain.chunks(data_len) {
        let mut sum = 0u32;
        for dw in chunk.chunks_exact(4) {
            let p = u32::from_le_bytes([dw[0], dw[1], dw[2], dw[3]]);
            sum = sum.wrapping_add(p);
            out.extend_from_slice(&(p ^ key).to_le_bytes());
        }
        out.extend_from_slice(&sum.to_le_bytes());
    }
    out
}

// ── Assets ───────────────────────────────────────────────────────────────────

pub const CHARACTERISTICS: [u32; 5] = [60, 50, 70, 55, 65];

/// Vehicle body up to and including the telemetry list.
pub fn vehicle_prefix(w: &mut Writer) {
    w.string("NEMESIS");
    let mut telemetry = vec![0u8; 0x558];
    for i in 0..5 {
        let at = i * 216 + 0x48;
        let vals = [(i as i32 + 1) * ONE, 0, ONE];
        for (k, v) in vals.iter().enumerate() {
            telemetry[at + k * 4..at + k * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
    }
    w.bytes(&telemetry).u32(2).u32(7).u32(8);
}

pub fn vehicle() -> Vec<u8> {
    let mut c = Container::with_slots(1);
    let w = &mut c.body;
    vehicle_prefix(w);
    w.string("TEXTURE").texture_list(2, 128, 128, 0xF800);
    w.u32(0);

    let prism = ObjectFlags { prism: true, ..Default::default() };
    let chassis = [
        Face::quad("TEXTURE", 0),
        Face::tri("GOURAUD", 0x00FF_0000),
        Face::tri("TEXGOU", 1),
        Face::tri("FLAT", 0x0000_00FF).hidden(),
    ];
    for _ in 0..3 {
        w.object(&SQUARE, &chassis, prism);
        for _ in 0..5 {
            w.object(&SQUARE, &[Face::tri("TEXTURE", 1)], prism);
        }
    }
    for _ in 0..4 {
        w.object(&SQUARE, &[Face::quad("TEXTURE", 0)], prism);
    }
    for _ in 0..4 {
        w.object(&SQUARE, &[Face::quad("FLAT", 0)], ObjectFlags::default());
    }
    for _ in 0..2 {
        w.string("COLLISION").u32(0).object(&SQUARE, &[Face::quad("FLAT", 0x123456)], prism);
        w.u32(1).u32(2).u32(3).u32(4).u32(5).u32(6).u32(1).zeros(64);
    }
    w.u32(0);
    for i in 0..16u16 {
        w.u16(i);
    }
    for v in CHARACTERISTICS {
        w.u32(v);
    }
    c.seal(BLOCK_SIZE)
}

fn difficulty(w: &mut Writer, name: &str, path: &str) {
    w.string(name).string(path);
    w.u32(1).fixed3([ONE, 2 * ONE, 3 * ONE]);
    w.u32(1).u32(1).i32(0).i32(0).i32(0).i32(0);
    w.string("NEANT");
    w.string("NEANT");
}

fn designation(w: &mut Writer, start: [i32; 3]) {
    for i in 0..14 {
        w.u32(i);
    }
    w.string("NEANT").u32(0).u32(0);
    w.u32(1).fixed3(start).zeros(24);
}

fn junk(w: &mut Writer) {
    w.bytes(&[0xEE; 20]);
}

pub const DIFFICULTY_NAMES: [&str; 6] = ["F_EASY", "F_NORMAL", "F_HARD", "R_EASY", "R_NORMAL", "R_HARD"];

/// Two sectors, one decoration, one Anim2 track and every race section
/// behind the offset table, with junk bytes between the slots.
pub fn circuit() -> Vec<u8> {
    let mut c = Container::with_slots(9);
    c.mark(0);
    {
        let w = &mut c.body;
        w.u32(3).u32(0).i32(1).u32(2);
        w.string("START").i32(2).i32(1).bytes(&[9, 9]);
        w.u32(1).u32(0).u32(0).u32(0);
        for _ in 0..6 {
            w.u32(0);
        }
        w.string("ALDERON");
        for i in 0..16 {
            w.u32(i);
        }
        w.string("PROJ");
        w.texture_list(1, 256, 256, 0x07E0);
        w.u32(0);

        let sector = ObjectFlags { unk_property: true, circuit: true, ..Default::default() };
        w.u32(2);
        w.object(&SQUARE, &[Face::quad("TEXTURE", 0), Face::tri("GOURAUD", 0x0000_FF00)], sector);
        w.bytes(&[1, 2, 3, 4]).fixed3([0, 0, 0]).fixed3([ONE, ONE, 0]);
        let mut blank = Face::tri("TEXTURE", 0);
        blank.normal = [0, 0, 0];
        w.object(&SQUARE, &[Face::tri("TEXTURE", 0), blank], sector);
        w.bytes(&[5, 6, 7, 8]).fixed3([0, 0, 0]).fixed3([ONE, ONE, ONE]);

        w.u32(2).i32(-1).i32(2).i32(1).i32(0);

        w.string("DECORS").u32(0);
        w.u32(1).string("TREE").string("tree").texture_list(1, 128, 128, 0x001F).u32(0);
        w.object(&SQUARE, &[Face::tri("TEXTURE", 0)], ObjectFlags::default());
        w.fixed3([0; 3]).u32(0).fixed3([0; 3]).u32(0).u32(0).u32(0).u32(0).u32(0).u32(0);
        w.u32(1).zeros(64);
        w.u32(1).i32(0).u32(1).i32(1).i32(2).fixed3([0, 0, ONE]).identity_rotation();
        w.u32(0).u32(0);

        w.string("NEANT");
        w.string("NEANT");
        w.string("NEANT");

        w.i32(1).i32(2).i32(3).i32(4).u32(1).u32(0x00FF_FFFF).string("BACK").texture_list(0, 256, 256, 0);
        w.i32(5).i32(6);
        w.u32(1).i32(1).i32(2).i32(3).i32(4).i32(5).string("SKY").texture_list(0, 128, 128, 0);
        w.zeros(128 * 128 * 2).i32(7);

        w.u32(1).string("ANIM2").u32(1);
        w.string("water").u32(2);
        w.i32(0);
        for _ in 0..4 {
            w.u32(0).u32(0);
        }
        w.i32(0);
        for _ in 0..4 {
            w.u32(255).u32(255);
        }
        w.i32(2 * ONE).u32(2).i32(0).i32(0).i32(ONE).i32(1);
        w.u32(0);
        w.u32(1).i32(0).u32(1).i32(0).u32(1).i32(1).i32(4).i32(0);

        w.string("NEANT");

        designation(w, [ONE, 0, 0]);
        difficulty(w, DIFFICULTY_NAMES[0], "PATH_F");
        junk(w);
    }
    c.mark(1);
    difficulty(&mut c.body, DIFFICULTY_NAMES[1], "PATH_F");
    junk(&mut c.body);
    c.mark(2);
    difficulty(&mut c.body, DIFFICULTY_NAMES[2], "PATH_F");
    junk(&mut c.body);
    c.mark(3);
    designation(&mut c.body, [0, ONE, 0]);
    difficulty(&mut c.body, DIFFICULTY_NAMES[3], "PATH_R");
    junk(&mut c.body);
    c.mark(4);
    difficulty(&mut c.body, DIFFICULTY_NAMES[4], "PATH_R");
    junk(&mut c.body);
    c.mark(5);
    difficulty(&mut c.body, DIFFICULTY_NAMES[5], "PATH_R");
    junk(&mut c.body);
    for (slot, tier) in [(6, "EASY"), (7, "NORMAL"), (8, "HARD")] {
        c.mark(slot);
        c.body.string(tier).string("RIVALS").u32(1);
        c.body.string("ZED").i32(1).i32(2).string("07").i32(0);
        junk(&mut c.body);
    }
    c.seal(BLOCK_SIZE)
}
