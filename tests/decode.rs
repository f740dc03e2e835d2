use byteorder::{ByteOrder, LittleEndian};
use icocur::{ColorModel, Decoder, Error, ErrorKind, IconImage, ResourceType};
use std::io::{self, Cursor, Read};

//===========================================================================//

#[test]
fn decode_one_bpp_bmp_with_mask() {
    let mut payload = info_header(2, 4, 1);
    payload.extend_from_slice(&[0x00, 0x00, 0xff, 0x00]); // red (BGR0)
    payload.extend_from_slice(&[0xff, 0x00, 0x00, 0x00]); // blue
    // Pixel rows, bottom row first:
    payload.extend_from_slice(&[0x80, 0, 0, 0, 0x40, 0, 0, 0]);
    // Mask rows, bottom row first; the bottom-right pixel is hidden.
    payload.extend_from_slice(&[0x40, 0, 0, 0, 0x00, 0, 0, 0]);
    let data = single_entry(ResourceType::Icon, &payload, [1, 1]);

    let decoder = Decoder::new(Cursor::new(&data), ResourceType::Icon).unwrap();
    let entry = &decoder.entries()[0];
    assert!(!entry.is_png());
    assert_eq!((entry.width(), entry.height()), (2, 2));
    assert_eq!(entry.bits_per_pixel(), 1);
    assert_eq!(entry.num_colors(), 2);

    let image = icocur::ico::decode(Cursor::new(&data)).unwrap();
    assert_eq!(image.color_model(), ColorModel::Paletted);
    assert_eq!(image.pixel(0, 0), [0xff, 0, 0, 0xff]);
    assert_eq!(image.pixel(1, 0), [0, 0, 0xff, 0xff]);
    assert_eq!(image.pixel(0, 1), [0, 0, 0xff, 0xff]);
    assert_eq!(image.pixel(1, 1), [0, 0, 0, 0]);
    // A transparent entry was appended to the color table.
    assert_eq!(image.palette().unwrap().len(), 3);
}

#[test]
fn decode_top_down_bmp() {
    // A negative height means rows run top to bottom, for the mask too.
    let mut payload = info_header(2, -4, 32);
    payload.extend_from_slice(&[30, 20, 10, 0xff, 60, 50, 40, 0xff]);
    payload.extend_from_slice(&[90, 80, 70, 0xff, 3, 2, 1, 0xff]);
    payload.extend_from_slice(&[0x80, 0, 0, 0, 0x00, 0, 0, 0]);
    let data = single_entry(ResourceType::Icon, &payload, [1, 32]);
    let image = icocur::ico::decode(Cursor::new(data)).unwrap();
    assert_eq!(image.color_model(), ColorModel::Rgba);
    // The mask wins over an opaque alpha byte.
    assert_eq!(image.pixel(0, 0), [0, 0, 0, 0]);
    assert_eq!(image.pixel(1, 0), [40, 50, 60, 0xff]);
    assert_eq!(image.pixel(0, 1), [70, 80, 90, 0xff]);
    assert_eq!(image.pixel(1, 1), [1, 2, 3, 0xff]);
}

#[test]
fn decode_all_zero_mask_keeps_pixels() {
    let mut payload = info_header(1, 2, 24);
    payload.extend_from_slice(&[7, 8, 9, 0]);
    payload.extend_from_slice(&[0; 4]);
    let data = single_entry(ResourceType::Icon, &payload, [1, 24]);
    let image = icocur::ico::decode(Cursor::new(data)).unwrap();
    assert_eq!(image.color_model(), ColorModel::Rgb);
    assert_eq!(image.pixel(0, 0), [9, 8, 7, 0xff]);
}

#[test]
fn decode_all_ones_mask_hides_everything() {
    let mut payload = info_header(3, 4, 24);
    payload.extend_from_slice(&[0x55; 12 * 2]);
    payload.extend_from_slice(&[0xff; 4 * 2]);
    let data = single_entry(ResourceType::Icon, &payload, [1, 24]);
    let image = icocur::ico::decode(Cursor::new(data)).unwrap();
    assert_eq!(image.to_rgba_data(), vec![0; 3 * 2 * 4]);
}

#[test]
fn decode_full_palette_promotes_to_rgba() {
    // A grayscale image is stored with a full 256-entry color table, so
    // masking a pixel out needs a direct-color result.
    let image = IconImage::from_gray_data(4, 4, vec![0x77; 16]);
    let mut data = Vec::new();
    icocur::ico::encode(&mut data, &image).unwrap();
    let mask_start = data.len() - 4 * 4;
    data[mask_start] = 0x80;
    let decoded = icocur::ico::decode(Cursor::new(data)).unwrap();
    assert_eq!(decoded.color_model(), ColorModel::Rgba);
    assert_eq!(decoded.pixel(0, 3), [0, 0, 0, 0]);
    assert_eq!(decoded.pixel(1, 3), [0x77, 0x77, 0x77, 0xff]);
}

#[test]
fn decode_png_entry() {
    let rgba: Vec<u8> = (0..(16 * 16 * 4)).map(|i| (i % 253) as u8).collect();
    let image = IconImage::from_rgba_data(16, 16, rgba.clone());
    let mut png = Vec::new();
    image.write_png(&mut png).unwrap();
    let data = single_entry(ResourceType::Icon, &png, [1, 32]);
    let decoder = Decoder::new(Cursor::new(&data), ResourceType::Icon).unwrap();
    assert!(decoder.entries()[0].is_png());
    assert_eq!(decoder.entries()[0].bits_per_pixel(), 32);
    let config = icocur::ico::decode_config(Cursor::new(&data)).unwrap();
    assert_eq!((config.width, config.height), (16, 16));
    assert_eq!(config.color_model, ColorModel::Rgba);
    let decoded = icocur::ico::decode(Cursor::new(&data)).unwrap();
    assert_eq!(decoded.to_rgba_data(), rgba);
}

#[test]
fn decode_config_of_bmp_entry() {
    let image = IconImage::from_rgb_data(20, 10, vec![0x42; 20 * 10 * 3]);
    let mut data = Vec::new();
    icocur::ico::encode(&mut data, &image).unwrap();
    let config = icocur::ico::decode_config(Cursor::new(data)).unwrap();
    assert_eq!((config.width, config.height), (20, 10));
    assert_eq!(config.color_model, ColorModel::Rgb);
}

#[test]
fn decode_picks_largest_then_deepest() {
    let images = vec![
        IconImage::from_gray_data(16, 16, vec![0; 16 * 16]),
        IconImage::from_gray_data(24, 24, vec![0; 24 * 24]),
        IconImage::from_rgb_data(24, 24, vec![0; 24 * 24 * 3]),
        IconImage::from_gray_data(12, 12, vec![0; 12 * 12]),
    ];
    let mut data = Vec::new();
    icocur::ico::encode_all(&mut data, &images).unwrap();
    let decoder = Decoder::new(Cursor::new(&data), ResourceType::Icon).unwrap();
    assert_eq!(decoder.best(), 2);
    let image = icocur::ico::decode(Cursor::new(&data)).unwrap();
    assert_eq!(image.color_model(), ColorModel::Rgb);
}

//===========================================================================//

#[test]
fn forward_only_matches_seekable() {
    let images = vec![
        IconImage::from_gray_data(5, 5, (0..25).collect()),
        IconImage::from_rgba_data(3, 2, [1, 2, 3, 0xff, 0, 0, 0, 0].repeat(3)),
        IconImage::from_rgb_data(256, 256, vec![0x10; 256 * 256 * 3]),
    ];
    let mut data = Vec::new();
    icocur::ico::encode_all(&mut data, &images).unwrap();
    // Store the payloads in reverse, so directory order and file order
    // disagree.
    let data = reverse_payloads(&data);

    let expected = icocur::ico::decode_all(Cursor::new(&data)).unwrap();
    let mut decoder =
        Decoder::new_forward_only(ForwardOnly(data.as_slice()), ResourceType::Icon)
            .unwrap();
    assert_eq!(decoder.entries().len(), 3);
    assert!(decoder.entries()[2].is_png());
    assert_eq!(decoder.decode_all().unwrap(), expected);
    // Entries are buffered, so decoding again works too.
    assert_eq!(decoder.decode(0).unwrap(), expected[0]);
    let config = decoder.decode_config(1).unwrap();
    assert_eq!((config.width, config.height), (3, 2));
}

#[test]
fn forward_only_rejects_overlapping_entries() {
    let image = IconImage::from_gray_data(2, 2, vec![1; 4]);
    let mut data = Vec::new();
    icocur::ico::encode(&mut data, &image).unwrap();
    let data = duplicate_entry(&data);
    // A seekable source can read the same bytes twice...
    let images = icocur::ico::decode_all(Cursor::new(&data)).unwrap();
    assert_eq!(images.len(), 2);
    // ...but a forward-only one can't.
    match Decoder::new_forward_only(ForwardOnly(data.as_slice()), ResourceType::Icon) {
        Err(Error::Unsupported(message)) => assert_eq!(message, "overlapping offset"),
        Err(error) => panic!("unexpected error: {}", error),
        Ok(_) => panic!("expected an error"),
    }
}

#[test]
fn broken_seek_falls_back_to_forward_reads() {
    let image = IconImage::from_gray_data(3, 3, vec![9; 9]);
    let mut data = Vec::new();
    icocur::ico::encode(&mut data, &image).unwrap();
    let decoded = icocur::ico::decode(BrokenSeek(data.as_slice())).unwrap();
    assert_eq!(decoded.to_rgba_data(), image.to_rgba_data());
}

//===========================================================================//

#[test]
fn decode_zeros_is_not_an_icon() {
    let data = [0u8; 10];
    let error = icocur::ico::decode(Cursor::new(&data[..])).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Format);
    assert_eq!(error.to_string(), "invalid format: not an ICO file");
    let error = icocur::cur::decode(Cursor::new(&data[..])).unwrap_err();
    assert_eq!(error.to_string(), "invalid format: not a CUR file");
}

#[test]
fn decode_empty_directory() {
    let data = b"\x00\x00\x01\x00\x00\x00";
    let error = icocur::ico::decode_all(Cursor::new(&data[..])).unwrap_err();
    assert_eq!(error.to_string(), "invalid format: no icons");
}

#[test]
fn decode_truncated_entry() {
    let image = IconImage::from_rgb_data(4, 4, vec![0; 48]);
    let mut data = Vec::new();
    icocur::ico::encode(&mut data, &image).unwrap();
    data.truncate(data.len() - 10);
    let error = icocur::ico::decode(Cursor::new(&data)).unwrap_err();
    assert!(matches!(error, Error::Truncated));
    assert_eq!(error.kind(), ErrorKind::Format);
    let error =
        Decoder::new_forward_only(ForwardOnly(data.as_slice()), ResourceType::Icon)
            .err()
            .unwrap();
    assert!(matches!(error, Error::Truncated));
}

#[test]
fn decode_odd_bmp_height_is_unsupported() {
    let mut payload = info_header(2, 3, 24);
    payload.extend_from_slice(&[0; 64]);
    let data = single_entry(ResourceType::Icon, &payload, [1, 24]);
    let error = icocur::ico::decode(Cursor::new(data)).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Unsupported);
    assert_eq!(error.to_string(), "unsupported feature: BMP image");
}

#[test]
fn decode_huge_bmp_dimensions_fails() {
    // Dimensions this large must be rejected before any pixel buffer is
    // allocated for them.
    let mut payload = info_header(i32::MAX, i32::MIN, 32);
    payload.extend_from_slice(&[0; 64]);
    let data = single_entry(ResourceType::Icon, &payload, [1, 32]);
    let error = Decoder::new(Cursor::new(&data), ResourceType::Icon).err().unwrap();
    assert_eq!(error.kind(), ErrorKind::Format);
    assert_eq!(
        error.to_string(),
        "invalid format: invalid image size: 2147483647x1073741824"
    );
    let error = icocur::ico::decode(Cursor::new(&data)).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Format);
    let error = icocur::ico::decode_config(Cursor::new(&data)).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Format);

    let mut payload = info_header(300, 2, 24);
    payload.extend_from_slice(&[0; 64]);
    let data = single_entry(ResourceType::Icon, &payload, [1, 24]);
    let error = icocur::ico::decode_all(Cursor::new(&data)).unwrap_err();
    assert_eq!(error.to_string(), "invalid format: invalid image size: 300x1");
}

#[test]
fn guess_resource_type_from_prefix() {
    assert_eq!(
        icocur::guess_resource_type(b"\x00\x00\x01\x00\x03\x00"),
        Some(ResourceType::Icon)
    );
    assert_eq!(
        icocur::guess_resource_type(b"\x00\x00\x02\x00"),
        Some(ResourceType::Cursor)
    );
    assert_eq!(icocur::guess_resource_type(b"\x89PNG"), None);
    assert_eq!(icocur::guess_resource_type(b"\x00\x00"), None);
}

//===========================================================================//

// A source with no way to seek at all.
struct ForwardOnly<R>(R);

impl<R: Read> Read for ForwardOnly<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

// A source that claims to seek but always fails, like a pipe opened as a file.
struct BrokenSeek<R>(R);

impl<R: Read> Read for BrokenSeek<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<R> io::Seek for BrokenSeek<R> {
    fn seek(&mut self, _pos: io::SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Other, "illegal seek"))
    }
}

fn info_header(width: i32, stored_height: i32, bits_per_pixel: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&40u32.to_le_bytes());
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&stored_height.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());
    data.extend_from_slice(&bits_per_pixel.to_le_bytes());
    data.extend_from_slice(&[0; 24]);
    data
}

fn single_entry(restype: ResourceType, payload: &[u8], fields: [u16; 2]) -> Vec<u8> {
    let kind: u16 = match restype {
        ResourceType::Icon => 1,
        ResourceType::Cursor => 2,
    };
    let mut data = vec![0, 0];
    data.extend_from_slice(&kind.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());
    // The dimension bytes are deliberately wrong; the embedded header wins.
    data.extend_from_slice(&[9, 9, 0, 0]);
    data.extend_from_slice(&fields[0].to_le_bytes());
    data.extend_from_slice(&fields[1].to_le_bytes());
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    data.extend_from_slice(&22u32.to_le_bytes());
    data.extend_from_slice(payload);
    data
}

fn read_u32(data: &[u8], offset: usize) -> usize {
    LittleEndian::read_u32(&data[offset..]) as usize
}

fn reverse_payloads(data: &[u8]) -> Vec<u8> {
    let count = LittleEndian::read_u16(&data[4..6]) as usize;
    let table_len = 6 + 16 * count;
    let spans: Vec<(usize, usize)> = (0..count)
        .map(|index| {
            let record = 6 + 16 * index;
            (read_u32(data, record + 12), read_u32(data, record + 8))
        })
        .collect();
    let mut output = data[..table_len].to_vec();
    for index in (0..count).rev() {
        let (start, size) = spans[index];
        let offset = output.len() as u32;
        let record = 6 + 16 * index;
        output[record + 12..record + 16].copy_from_slice(&offset.to_le_bytes());
        output.extend_from_slice(&data[start..start + size]);
    }
    output
}

// Turns a one-entry file into a two-entry file whose records share the same
// payload bytes.
fn duplicate_entry(data: &[u8]) -> Vec<u8> {
    let record = &data[6..22];
    let payload = &data[22..];
    let mut output = vec![0, 0, 1, 0, 2, 0];
    for _ in 0..2 {
        output.extend_from_slice(&record[..12]);
        output.extend_from_slice(&38u32.to_le_bytes());
    }
    output.extend_from_slice(payload);
    output
}

//===========================================================================//
