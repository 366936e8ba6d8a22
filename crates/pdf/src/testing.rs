//! 测试用 PDF 构造器

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// 一行 Helvetica 文字
#[derive(Debug, Clone)]
pub struct SampleLine {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub text: String,
}

impl SampleLine {
    pub fn new(x: f64, y: f64, size: f64, text: &str) -> Self {
        Self {
            x,
            y,
            size,
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SamplePage {
    content: Vec<Vec<u8>>,
    crop_box: Option<[f64; 4]>,
    rotate: Option<i64>,
    inherit_media_box: bool,
}

/// 构造包含简单文字页面的 PDF
#[derive(Debug, Clone, Default)]
pub struct SamplePdf {
    pages: Vec<SamplePage>,
}

fn line_operations(line: &SampleLine) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), (line.size as f32).into()]),
        Operation::new("Td", vec![(line.x as f32).into(), (line.y as f32).into()]),
        Operation::new("Tj", vec![Object::string_literal(line.text.as_str())]),
        Operation::new("ET", vec![]),
    ]
}

impl SamplePdf {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一页，所有行写入同一个内容流
    pub fn page(mut self, lines: Vec<SampleLine>) -> Self {
        // 同一个 Content 编码，操作之间由 encode 插入换行
        let content: Content<Vec<Operation>> = Content {
            operations: lines.iter().flat_map(line_operations).collect(),
        };
        self.pages.push(SamplePage {
            content: vec![content.encode().unwrap_or_default()],
            ..SamplePage::default()
        });
        self
    }

    /// 添加一页原始内容流
    pub fn raw_page(mut self, content: &str) -> Self {
        self.pages.push(SamplePage {
            content: vec![content.as_bytes().to_vec()],
            ..SamplePage::default()
        });
        self
    }

    /// 最后一页的每行使用独立内容流
    pub fn split_streams(mut self) -> Self {
        if let Some(page) = self.pages.last_mut() {
            let joined: Vec<u8> = page.content.concat();
            let content = Content::decode(&joined).unwrap_or(Content { operations: vec![] });
            page.content = content
                .operations
                .split(|op| op.operator == "ET")
                .filter(|ops| !ops.is_empty())
                .map(|ops| {
                    let mut ops = ops.to_vec();
                    ops.push(Operation::new("ET", vec![]));
                    Content { operations: ops }.encode().unwrap_or_default()
                })
                .collect();
        }
        self
    }

    pub fn crop_box(mut self, values: [f64; 4]) -> Self {
        if let Some(page) = self.pages.last_mut() {
            page.crop_box = Some(values);
        }
        self
    }

    pub fn rotate(mut self, degrees: i64) -> Self {
        if let Some(page) = self.pages.last_mut() {
            page.rotate = Some(degrees);
        }
        self
    }

    /// 最后一页不写 MediaBox，从页面树继承
    pub fn inherit_media_box(mut self) -> Self {
        if let Some(page) = self.pages.last_mut() {
            page.inherit_media_box = true;
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
        });
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for page in &self.pages {
            let streams: Vec<Object> = page
                .content
                .iter()
                .map(|data| {
                    Object::Reference(doc.add_object(Stream::new(dictionary! {}, data.clone())))
                })
                .collect();
            let contents = if streams.len() == 1 {
                streams[0].clone()
            } else {
                Object::Array(streams)
            };

            let mut dict = dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "Resources" => Object::Reference(resources_id),
                "Contents" => contents,
            };
            if !page.inherit_media_box {
                dict.set(
                    "MediaBox",
                    vec![0.into(), 0.into(), 612.into(), 792.into()],
                );
            }
            if let Some(values) = page.crop_box {
                dict.set(
                    "CropBox",
                    values
                        .iter()
                        .map(|v| Object::Real(*v as f32))
                        .collect::<Vec<_>>(),
                );
            }
            if let Some(degrees) = page.rotate {
                dict.set("Rotate", degrees);
            }
            kids.push(Object::Reference(doc.add_object(dict)));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        if let Err(e) = doc.save_to(&mut buffer) {
            log::error!("[SamplePdf] 写出失败: {}", e);
        }
        buffer
    }
}
