use crate::assemble::{encode_entry, EncodedEntry};
use crate::bmp;
use crate::error::{Error, Result};
use crate::header::{SubImageFormat, SubImageHeader};
use crate::image::{IconImage, ImageConfig};
use crate::mask;
use crate::restype::ResourceType;
use crate::stream::StreamReader;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Seek, SeekFrom, Take, Write};

//===========================================================================//

// The size of the ICONDIR struct at the start of every file, in bytes.
const FILE_HEADER_LEN: u32 = 6;
// The size of one ICONDIRENTRY struct, in bytes.
const DIR_ENTRY_LEN: u32 = 16;

//===========================================================================//

/// The pixel within a cursor image that marks the pointer's position.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Hotspot {
    /// Distance from the left edge, in pixels.
    pub x: u16,
    /// Distance from the top edge, in pixels.
    pub y: u16,
}

//===========================================================================//

/// One entry in an ICO or CUR file, as described by its directory record and
/// the header embedded in its image data.
#[derive(Clone, Debug)]
pub struct IconDirEntry {
    restype: ResourceType,
    width: u32,
    height: u32,
    num_colors: u32,
    bits_per_pixel: u16,
    hotspot: Hotspot,
    offset: u32,
    size: u32,
    format: SubImageFormat,
    // The entry's bytes past its header, when the source couldn't seek back
    // to them later.
    buffered: Option<Vec<u8>>,
}

impl IconDirEntry {
    /// Returns the type of resource stored in this entry, either an icon or a
    /// cursor.
    pub fn resource_type(&self) -> ResourceType {
        self.restype
    }

    /// Returns the width of the image, in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height of the image, in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the number of colors in the image's palette, or zero if it has
    /// none.
    pub fn num_colors(&self) -> u32 {
        self.num_colors
    }

    /// Returns the bits-per-pixel (color depth) of the image.
    pub fn bits_per_pixel(&self) -> u16 {
        self.bits_per_pixel
    }

    /// Returns the cursor hotspot, or `None` if this entry is an icon.
    pub fn cursor_hotspot(&self) -> Option<Hotspot> {
        match self.restype {
            ResourceType::Icon => None,
            ResourceType::Cursor => Some(self.hotspot),
        }
    }

    /// Returns the offset of the entry's data within the file, as recorded in
    /// the directory.
    pub fn data_offset(&self) -> u32 {
        self.offset
    }

    /// Returns the length of the entry's data, as recorded in the directory.
    pub fn data_size(&self) -> u32 {
        self.size
    }

    /// Returns true if the image is stored as a PNG, false if it's stored as
    /// a bitmap plus AND mask.
    pub fn is_png(&self) -> bool {
        self.format == SubImageFormat::Png
    }

    fn area(&self) -> u64 {
        (self.width as u64) * (self.height as u64)
    }
}

//===========================================================================//

// A directory record, as stored in the file.
struct DirRecord {
    hotspot: Hotspot,
    size: u32,
    offset: u32,
}

/// Reads the directory of an ICO or CUR file, then decodes its images on
/// demand.
pub struct Decoder<R> {
    reader: StreamReader<R>,
    restype: ResourceType,
    entries: Vec<IconDirEntry>,
}

impl<R: Read + Seek> Decoder<R> {
    /// Reads the directory from a seekable source, along with the header of
    /// every entry.  Image data is left in place until decoded.  If the source
    /// turns out not to support seeking after all, entries are buffered as
    /// with [`Decoder::new_forward_only`].
    pub fn new(reader: R, restype: ResourceType) -> Result<Decoder<R>> {
        Decoder::start(StreamReader::seekable(reader), restype)
    }
}

impl<R: Read> Decoder<R> {
    /// Reads the directory from a source that can only be read front to back.
    /// Every entry's data is read into memory up front, in file order; entries
    /// whose data overlaps fail as unsupported.
    pub fn new_forward_only(
        reader: R,
        restype: ResourceType,
    ) -> Result<Decoder<R>> {
        Decoder::start(StreamReader::forward_only(reader), restype)
    }

    fn start(
        mut reader: StreamReader<R>,
        restype: ResourceType,
    ) -> Result<Decoder<R>> {
        let records = read_directory(&mut reader, restype)?;
        let mut decoder = Decoder { reader, restype, entries: Vec::new() };
        decoder.entries = if decoder.reader.can_seek() {
            decoder.resolve_in_place(records)?
        } else {
            decoder.resolve_buffered(records)?
        };
        Ok(decoder)
    }

    fn resolve_in_place(
        &mut self,
        records: Vec<DirRecord>,
    ) -> Result<Vec<IconDirEntry>> {
        let mut entries = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            self.reader.seek(SeekFrom::Start(record.offset as u64))?;
            let header =
                SubImageHeader::read((&mut self.reader).take(record.size as u64))?;
            entries.push(self.resolve(index, record, header, None));
        }
        Ok(entries)
    }

    fn resolve_buffered(
        &mut self,
        records: Vec<DirRecord>,
    ) -> Result<Vec<IconDirEntry>> {
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by_key(|&index| records[index].offset);
        let mut resolved: Vec<Option<IconDirEntry>> =
            records.iter().map(|_| None).collect();
        let mut records: Vec<Option<DirRecord>> =
            records.into_iter().map(Some).collect();
        for index in order {
            let record = match records[index].take() {
                Some(record) => record,
                None => continue,
            };
            self.reader.seek(SeekFrom::Start(record.offset as u64))?;
            let mut data = Vec::new();
            (&mut self.reader).take(record.size as u64).read_to_end(&mut data)?;
            if data.len() < record.size as usize {
                return Err(Error::Truncated);
            }
            let header = SubImageHeader::read(data.as_slice())?;
            let rest = data.split_off(header.consumed_len() as usize);
            resolved[index] = Some(self.resolve(index, record, header, Some(rest)));
        }
        Ok(resolved.into_iter().flatten().collect())
    }

    fn resolve(
        &self,
        index: usize,
        record: DirRecord,
        header: SubImageHeader,
        buffered: Option<Vec<u8>>,
    ) -> IconDirEntry {
        tracing::trace!(
            index,
            png = header.is_png(),
            width = header.width,
            height = header.height,
            bits_per_pixel = header.bits_per_pixel,
            size = record.size,
            "Resolved entry header"
        );
        IconDirEntry {
            restype: self.restype,
            width: header.width,
            height: header.height,
            num_colors: header.num_colors,
            bits_per_pixel: header.bits_per_pixel,
            hotspot: record.hotspot,
            offset: record.offset,
            size: record.size,
            format: header.format,
            buffered,
        }
    }

    /// Returns the type of resource stored in this file.
    pub fn resource_type(&self) -> ResourceType {
        self.restype
    }

    /// Returns the entries in the file, in directory order.  There is always
    /// at least one.
    pub fn entries(&self) -> &[IconDirEntry] {
        &self.entries
    }

    /// Returns the index of the entry with the largest area, preferring the
    /// greater color depth among equally large entries.  Ties beyond that go
    /// to the earliest entry.
    pub fn best(&self) -> usize {
        let mut best = 0;
        for (index, entry) in self.entries.iter().enumerate().skip(1) {
            let current = &self.entries[best];
            if entry.area() > current.area()
                || (entry.area() == current.area()
                    && entry.bits_per_pixel > current.bits_per_pixel)
            {
                best = index;
            }
        }
        best
    }

    /// Decodes the image of one entry.  Panics if `index` is out of range.
    pub fn decode(&mut self, index: usize) -> Result<IconImage> {
        let entry = &self.entries[index];
        let source = entry_source(&mut self.reader, entry)?;
        match entry.format {
            SubImageFormat::Png => IconImage::read_png(source),
            SubImageFormat::Dib { ref header, top_down } => {
                let mut source = (&header[..]).chain(source);
                let image = bmp::read_bmp(&mut source)?;
                let (mask, opaque) = mask::read_mask(
                    &mut source,
                    entry.width,
                    entry.height,
                    top_down,
                )?;
                if opaque {
                    return Ok(image);
                }
                Ok(image.clear_masked(|x, y| {
                    x < mask.width() && y < mask.height() && mask.pixel(x, y)[3] != 0
                }))
            }
        }
    }

    /// Decodes the images of every entry, in directory order.
    pub fn decode_all(&mut self) -> Result<Vec<IconImage>> {
        (0..self.entries.len()).map(|index| self.decode(index)).collect()
    }

    /// Reports the dimensions and color model of one entry's image without
    /// decoding its pixels.  Panics if `index` is out of range.
    pub fn decode_config(&mut self, index: usize) -> Result<ImageConfig> {
        let entry = &self.entries[index];
        let source = entry_source(&mut self.reader, entry)?;
        match entry.format {
            SubImageFormat::Png => IconImage::read_png_config(source),
            SubImageFormat::Dib { ref header, .. } => {
                bmp::read_bmp_config((&header[..]).chain(source))
            }
        }
    }

    /// Returns the cursor hotspot of every entry, in directory order, or
    /// `None` for an icon file.
    pub fn hotspots(&self) -> Option<Vec<Hotspot>> {
        self.entries.iter().map(IconDirEntry::cursor_hotspot).collect()
    }
}

fn read_directory<R: Read>(
    reader: &mut StreamReader<R>,
    restype: ResourceType,
) -> Result<Vec<DirRecord>> {
    let _reserved = reader.read_u16::<LittleEndian>()?;
    let kind = reader.read_u16::<LittleEndian>()?;
    if ResourceType::from_number(kind) != Some(restype) {
        format_error!(restype.not_this_kind());
    }
    let count = reader.read_u16::<LittleEndian>()?;
    if count == 0 {
        format_error!(restype.none_stored());
    }
    tracing::debug!(?restype, count, "Reading directory");
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        // The width, height, color count and reserved bytes are all superseded
        // by the entry's own header.
        let mut dims = [0u8; 4];
        reader.read_exact(&mut dims)?;
        let field3 = reader.read_u16::<LittleEndian>()?;
        let field4 = reader.read_u16::<LittleEndian>()?;
        let size = reader.read_u32::<LittleEndian>()?;
        let offset = reader.read_u32::<LittleEndian>()?;
        let hotspot = match restype {
            ResourceType::Icon => Hotspot::default(),
            ResourceType::Cursor => Hotspot { x: field3, y: field4 },
        };
        records.push(DirRecord { hotspot, size, offset });
    }
    Ok(records)
}

//===========================================================================//

// The bytes of one entry past its header.
enum EntrySource<'a, R> {
    Stream(Take<&'a mut StreamReader<R>>),
    Buffered(&'a [u8]),
}

impl<R: Read> Read for EntrySource<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match *self {
            EntrySource::Stream(ref mut reader) => reader.read(buf),
            EntrySource::Buffered(ref mut data) => data.read(buf),
        }
    }
}

fn entry_source<'a, R: Read>(
    reader: &'a mut StreamReader<R>,
    entry: &'a IconDirEntry,
) -> Result<EntrySource<'a, R>> {
    if let Some(ref data) = entry.buffered {
        return Ok(EntrySource::Buffered(data));
    }
    let consumed = entry.format.consumed_len();
    let start = entry.offset as u64 + consumed;
    let len = (entry.size as u64).saturating_sub(consumed);
    reader.seek(SeekFrom::Start(start))?;
    Ok(EntrySource::Stream(reader.take(len)))
}

//===========================================================================//

/// Accumulates images, then writes them out as a single ICO or CUR file.
pub struct Encoder<W> {
    writer: W,
    restype: ResourceType,
    entries: Vec<EncodedEntry>,
}

impl<W: Write> Encoder<W> {
    /// Creates an encoder that will write a file of the given type.
    pub fn new(writer: W, restype: ResourceType) -> Encoder<W> {
        Encoder { writer, restype, entries: Vec::new() }
    }

    /// Returns the type of resource this encoder writes.
    pub fn resource_type(&self) -> ResourceType {
        self.restype
    }

    /// Returns the number of images added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no images have been added yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validates and encodes an image, adding it as the next entry.  The
    /// hotspot is only written for cursors, but is validated either way.
    /// Nothing is written until [`Encoder::finish`].
    pub fn add(&mut self, image: &IconImage, hotspot: Hotspot) -> Result<()> {
        let entry = encode_entry(image, hotspot)?;
        self.entries.push(entry);
        Ok(())
    }

    /// Lays out the directory and all entries, then writes the whole file
    /// with a single call.  Returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        let data = self.serialize()?;
        self.writer.write_all(&data).map_err(Error::Io)?;
        Ok(self.writer)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        if self.entries.is_empty() {
            format_error!(self.restype.none_stored());
        }
        if self.entries.len() > (u16::MAX as usize) {
            format_error!(
                "too many entries (was {}, but max is {})",
                self.entries.len(),
                u16::MAX
            );
        }
        let count = self.entries.len() as u32;
        let table_len = FILE_HEADER_LEN + DIR_ENTRY_LEN * count;
        let total_len = self
            .entries
            .iter()
            .fold(table_len as u64, |total, entry| total + entry.data.len() as u64);
        if total_len > u32::MAX as u64 {
            format_error!("file too large ({} bytes)", total_len);
        }

        let mut data = Vec::with_capacity(total_len as usize);
        data.write_u16::<LittleEndian>(0)?; // reserved
        data.write_u16::<LittleEndian>(self.restype.number())?;
        data.write_u16::<LittleEndian>(count as u16)?;
        let mut offset = table_len;
        for entry in self.entries.iter() {
            // A width/height byte of zero indicates a size of 256.
            data.write_u8(saturate(entry.width))?;
            data.write_u8(saturate(entry.height))?;
            data.write_u8(saturate(entry.num_colors))?;
            data.write_u8(0)?; // reserved
            match self.restype {
                ResourceType::Icon => {
                    data.write_u16::<LittleEndian>(1)?; // color planes
                    data.write_u16::<LittleEndian>(entry.bits_per_pixel)?;
                }
                ResourceType::Cursor => {
                    data.write_u16::<LittleEndian>(entry.hotspot.x)?;
                    data.write_u16::<LittleEndian>(entry.hotspot.y)?;
                }
            }
            let size = entry.data.len() as u32;
            data.write_u32::<LittleEndian>(size)?;
            data.write_u32::<LittleEndian>(offset)?;
            offset += size;
        }
        for entry in self.entries.iter() {
            data.extend_from_slice(&entry.data);
        }
        Ok(data)
    }
}

fn saturate(value: u32) -> u8 {
    if value > 255 {
        0
    } else {
        value as u8
    }
}

//===========================================================================//


//===========================================================================//
