use crate::binary::{Cur, Out, Sentinel};
use crate::errors::Result;

/// Declares a GX enumeration stored as `$raw`. Unpacking an unknown raw
/// value is a format error, unless the enum names a fallback with
/// `= Variant`, in which case it is logged and the fallback is used.
macro_rules! gx_enum {
    (@unknown $name:ident $cur:ident $pos:ident $raw:ident) => {
        Err($cur.error_at($pos, format!("invalid {} {:#x}", stringify!($name), $raw)))
    };
    (@unknown $name:ident $cur:ident $pos:ident $raw:ident $fallback:ident) => {{
        warn!("unknown {} {:#x} at {:#x}, using {}",
            stringify!($name), $raw, $pos, stringify!($fallback));
        Ok($name::$fallback)
    }};

    (
        $(#[$attr:meta])*
        pub enum $name:ident : $raw:ty $(= $fallback:ident)? {
            $($(#[$vattr:meta])* $variant:ident = $value:expr,)*
        }
    ) => {
        $(#[$attr])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vattr])* $variant,)*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),*];

            pub fn from_raw(raw: $raw) -> Option<$name> {
                $(if raw == $value { return Some($name::$variant); })*
                None
            }

            pub fn raw(self) -> $raw {
                match self {
                    $($name::$variant => $value,)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)*
                }
            }
        }

        impl $crate::binary::Unpack for $name {
            fn unpack(cur: &mut $crate::binary::Cur) -> $crate::errors::Result<$name> {
                let pos = cur.pos();
                let raw = cur.next::<$raw>()?;
                match $name::from_raw(raw) {
                    Some(x) => Ok(x),
                    None => gx_enum!(@unknown $name cur pos raw $($fallback)?),
                }
            }
        }

        impl $crate::binary::Pack for $name {
            fn pack(&self, out: &mut $crate::binary::Out) -> $crate::errors::Result<()> {
                $crate::binary::Pack::pack(&self.raw(), out)
            }
        }

        impl $crate::binary::FixedSize for $name {
            const SIZE: usize = <$raw as $crate::binary::FixedSize>::SIZE;
        }
    };
}

/// Lets `Option<$name>` use the all-ones raw value for `None`.
macro_rules! gx_sentinel {
    ($name:ident : $raw:ty) => {
        impl Sentinel for $name {
            fn is_none_raw(cur: &Cur) -> Result<bool> {
                <$raw as Sentinel>::is_none_raw(cur)
            }
            fn pack_none(out: &mut Out) -> Result<()> {
                <$raw as Sentinel>::pack_none(out)
            }
        }
    };
}

gx_enum! {
    /// Vertex attribute. The `*MtxIdx` attributes carry matrix indices
    /// rather than array references.
    pub enum Attribute: u32 {
        PositionMatrixIndex = 0,
        Tex0MatrixIndex = 1,
        Tex1MatrixIndex = 2,
        Tex2MatrixIndex = 3,
        Tex3MatrixIndex = 4,
        Tex4MatrixIndex = 5,
        Tex5MatrixIndex = 6,
        Tex6MatrixIndex = 7,
        Tex7MatrixIndex = 8,
        Position = 9,
        Normal = 10,
        Color0 = 11,
        Color1 = 12,
        TexCoord0 = 13,
        TexCoord1 = 14,
        TexCoord2 = 15,
        TexCoord3 = 16,
        TexCoord4 = 17,
        TexCoord5 = 18,
        TexCoord6 = 19,
        TexCoord7 = 20,
        NormalBinormalTangent = 25,
        Null = 0xFF,
    }
}

impl Attribute {
    pub fn texcoord(i: usize) -> Attribute {
        Attribute::ALL[Attribute::TexCoord0 as usize + i]
    }

    pub fn tex_matrix_index(i: usize) -> Attribute {
        Attribute::ALL[Attribute::Tex0MatrixIndex as usize + i]
    }

    /// Attributes stored inline in a display list, not as array indices.
    pub fn is_matrix_index(self) -> bool {
        self.raw() <= 8
    }
}

gx_enum! {
    /// How a vertex attribute is given in display lists.
    pub enum InputType: u32 {
        None = 0,
        Direct = 1,
        Index8 = 2,
        Index16 = 3,
    }
}

impl InputType {
    pub fn size(self) -> usize {
        match self {
            InputType::None => 0,
            InputType::Direct | InputType::Index8 => 1,
            InputType::Index16 => 2,
        }
    }
}

gx_enum! {
    pub enum PrimitiveType: u8 {
        Quads = 0x80,
        Triangles = 0x90,
        TriangleStrip = 0x98,
        TriangleFan = 0xA0,
        Lines = 0xA8,
        LineStrip = 0xB0,
        Points = 0xB8,
    }
}

gx_enum! {
    pub enum CullMode: u32 {
        None = 0,
        Front = 1,
        Back = 2,
        All = 3,
    }
}

impl Default for CullMode {
    fn default() -> CullMode { CullMode::Back }
}

gx_enum! {
    pub enum ChannelSource: u8 {
        Register = 0,
        Vertex = 1,
    }
}

gx_enum! {
    pub enum DiffuseFunction: u8 {
        None = 0,
        Signed = 1,
        Clamp = 2,
    }
}

gx_enum! {
    pub enum AttenuationFunction: u8 {
        Specular = 0,
        Spot = 1,
        None = 2,
    }
}

gx_enum! {
    pub enum TexCoordFunction: u8 {
        Matrix3x4 = 0,
        Matrix2x4 = 1,
        Bump0 = 2,
        Bump1 = 3,
        Bump2 = 4,
        Bump3 = 5,
        Bump4 = 6,
        Bump5 = 7,
        Bump6 = 8,
        Bump7 = 9,
        Srtg = 10,
    }
}

gx_enum! {
    pub enum TexCoordSource: u8 {
        Position = 0,
        Normal = 1,
        Binormal = 2,
        Tangent = 3,
        Tex0 = 4,
        Tex1 = 5,
        Tex2 = 6,
        Tex3 = 7,
        Tex4 = 8,
        Tex5 = 9,
        Tex6 = 10,
        Tex7 = 11,
        TexCoord0 = 12,
        TexCoord1 = 13,
        TexCoord2 = 14,
        TexCoord3 = 15,
        TexCoord4 = 16,
        TexCoord5 = 17,
        TexCoord6 = 18,
        Color0 = 19,
        Color1 = 20,
    }
}

gx_enum! {
    pub enum TexCoordId: u8 {
        TexCoord0 = 0,
        TexCoord1 = 1,
        TexCoord2 = 2,
        TexCoord3 = 3,
        TexCoord4 = 4,
        TexCoord5 = 5,
        TexCoord6 = 6,
        TexCoord7 = 7,
    }
}
gx_sentinel!(TexCoordId: u8);

gx_enum! {
    pub enum TexMapId: u8 {
        TexMap0 = 0,
        TexMap1 = 1,
        TexMap2 = 2,
        TexMap3 = 3,
        TexMap4 = 4,
        TexMap5 = 5,
        TexMap6 = 6,
        TexMap7 = 7,
    }
}
gx_sentinel!(TexMapId: u8);

impl TexCoordId {
    pub fn index(self) -> usize { self.raw() as usize }
}

impl TexMapId {
    pub fn index(self) -> usize { self.raw() as usize }
}

gx_enum! {
    /// Rasterized color fed to a TEV stage.
    pub enum ChannelId: u8 {
        Color0 = 0,
        Color1 = 1,
        Alpha0 = 2,
        Alpha1 = 3,
        Color0A0 = 4,
        Color1A1 = 5,
        ColorZero = 6,
        AlphaBump = 7,
        AlphaBumpN = 8,
    }
}
gx_sentinel!(ChannelId: u8);

gx_enum! {
    pub enum TevColorInput: u8 {
        PreviousColor = 0,
        PreviousAlpha = 1,
        Color0 = 2,
        Alpha0 = 3,
        Color1 = 4,
        Alpha1 = 5,
        Color2 = 6,
        Alpha2 = 7,
        TextureColor = 8,
        TextureAlpha = 9,
        RasterColor = 10,
        RasterAlpha = 11,
        One = 12,
        Half = 13,
        Konst = 14,
        Zero = 15,
    }
}

gx_enum! {
    pub enum TevAlphaInput: u8 {
        Previous = 0,
        A0 = 1,
        A1 = 2,
        A2 = 3,
        Texture = 4,
        Raster = 5,
        Konst = 6,
        Zero = 7,
    }
}

gx_enum! {
    pub enum TevFunction: u8 {
        Add = 0,
        Subtract = 1,
        CompareR8Greater = 8,
        CompareR8Equal = 9,
        CompareGR16Greater = 10,
        CompareGR16Equal = 11,
        CompareBGR24Greater = 12,
        CompareBGR24Equal = 13,
        CompareRGB8Greater = 14,
        CompareRGB8Equal = 15,
    }
}

impl TevFunction {
    pub fn is_compare(self) -> bool {
        self.raw() >= 8
    }
}

gx_enum! {
    pub enum TevBias: u8 {
        Zero = 0,
        AddHalf = 1,
        SubtractHalf = 2,
        Compare = 3,
    }
}

gx_enum! {
    pub enum TevScale: u8 {
        One = 0,
        Two = 1,
        Four = 2,
        Half = 3,
    }
}

gx_enum! {
    pub enum TevRegister: u8 {
        Previous = 0,
        Register0 = 1,
        Register1 = 2,
        Register2 = 3,
    }
}

gx_enum! {
    pub enum KColorSelection: u8 {
        One = 0x00,
        SevenEighths = 0x01,
        ThreeQuarters = 0x02,
        FiveEighths = 0x03,
        Half = 0x04,
        ThreeEighths = 0x05,
        Quarter = 0x06,
        Eighth = 0x07,
        K0 = 0x0C,
        K1 = 0x0D,
        K2 = 0x0E,
        K3 = 0x0F,
        K0R = 0x10,
        K1R = 0x11,
        K2R = 0x12,
        K3R = 0x13,
        K0G = 0x14,
        K1G = 0x15,
        K2G = 0x16,
        K3G = 0x17,
        K0B = 0x18,
        K1B = 0x19,
        K2B = 0x1A,
        K3B = 0x1B,
        K0A = 0x1C,
        K1A = 0x1D,
        K2A = 0x1E,
        K3A = 0x1F,
    }
}

gx_enum! {
    pub enum KAlphaSelection: u8 {
        One = 0x00,
        SevenEighths = 0x01,
        ThreeQuarters = 0x02,
        FiveEighths = 0x03,
        Half = 0x04,
        ThreeEighths = 0x05,
        Quarter = 0x06,
        Eighth = 0x07,
        K0R = 0x10,
        K1R = 0x11,
        K2R = 0x12,
        K3R = 0x13,
        K0G = 0x14,
        K1G = 0x15,
        K2G = 0x16,
        K3G = 0x17,
        K0B = 0x18,
        K1B = 0x19,
        K2B = 0x1A,
        K3B = 0x1B,
        K0A = 0x1C,
        K1A = 0x1D,
        K2A = 0x1E,
        K3A = 0x1F,
    }
}

impl KColorSelection {
    /// The constant color register this selector reads, if any.
    pub fn kcolor(self) -> Option<usize> {
        match self.raw() {
            r @ 0x0C..=0x0F => Some((r - 0x0C) as usize),
            r @ 0x10..=0x1F => Some((r & 3) as usize),
            _ => None,
        }
    }
}

impl KAlphaSelection {
    pub fn kcolor(self) -> Option<usize> {
        match self.raw() {
            r @ 0x10..=0x1F => Some((r & 3) as usize),
            _ => None,
        }
    }
}

impl Default for KColorSelection {
    fn default() -> KColorSelection { KColorSelection::One }
}

impl Default for KAlphaSelection {
    fn default() -> KAlphaSelection { KAlphaSelection::One }
}

gx_enum! {
    pub enum ColorComponent: u8 {
        R = 0,
        G = 1,
        B = 2,
        A = 3,
    }
}

gx_enum! {
    pub enum IndTexFormat: u8 {
        Bits8 = 0,
        Bits5 = 1,
        Bits4 = 2,
        Bits3 = 3,
    }
}

gx_enum! {
    pub enum IndTexBias: u8 {
        None = 0,
        S = 1,
        T = 2,
        ST = 3,
        U = 4,
        SU = 5,
        TU = 6,
        STU = 7,
    }
}

gx_enum! {
    pub enum IndTexMatrix: u8 {
        Off = 0,
        Matrix0 = 1,
        Matrix1 = 2,
        Matrix2 = 3,
        S0 = 5,
        S1 = 6,
        S2 = 7,
        T0 = 9,
        T1 = 10,
        T2 = 11,
    }
}

gx_enum! {
    pub enum IndTexWrap: u8 {
        Off = 0,
        Wrap256 = 1,
        Wrap128 = 2,
        Wrap64 = 3,
        Wrap32 = 4,
        Wrap16 = 5,
        Wrap0 = 6,
    }
}

gx_enum! {
    pub enum IndTexAlphaSelection: u8 {
        Off = 0,
        S = 1,
        T = 2,
        U = 3,
    }
}

gx_enum! {
    pub enum IndTexStageId: u8 {
        Stage0 = 0,
        Stage1 = 1,
        Stage2 = 2,
        Stage3 = 3,
    }
}

gx_enum! {
    pub enum IndTexScale: u8 {
        Scale1 = 0,
        Scale2 = 1,
        Scale4 = 2,
        Scale8 = 3,
        Scale16 = 4,
        Scale32 = 5,
        Scale64 = 6,
        Scale128 = 7,
        Scale256 = 8,
    }
}

gx_enum! {
    pub enum CompareFunction: u8 {
        Never = 0,
        Less = 1,
        Equal = 2,
        LessEqual = 3,
        Greater = 4,
        NotEqual = 5,
        GreaterEqual = 6,
        Always = 7,
    }
}

gx_enum! {
    pub enum AlphaOperator: u8 {
        And = 0,
        Or = 1,
        Xor = 2,
        Xnor = 3,
    }
}

gx_enum! {
    pub enum BlendFunction: u8 {
        None = 0,
        Blend = 1,
        Logic = 2,
        Subtract = 3,
    }
}

gx_enum! {
    pub enum BlendSourceFactor: u8 {
        Zero = 0,
        One = 1,
        DestinationColor = 2,
        InverseDestinationColor = 3,
        SourceAlpha = 4,
        InverseSourceAlpha = 5,
        DestinationAlpha = 6,
        InverseDestinationAlpha = 7,
    }
}

gx_enum! {
    pub enum BlendDestinationFactor: u8 {
        Zero = 0,
        One = 1,
        SourceColor = 2,
        InverseSourceColor = 3,
        SourceAlpha = 4,
        InverseSourceAlpha = 5,
        DestinationAlpha = 6,
        InverseDestinationAlpha = 7,
    }
}

gx_enum! {
    pub enum LogicOperation: u8 {
        Clear = 0,
        And = 1,
        ReverseAnd = 2,
        Copy = 3,
        InverseAnd = 4,
        NoOp = 5,
        Xor = 6,
        Or = 7,
        Nor = 8,
        Equivalent = 9,
        Inverse = 10,
        ReverseOr = 11,
        InverseCopy = 12,
        InverseOr = 13,
        Nand = 14,
        Set = 15,
    }
}

gx_enum! {
    pub enum FogFunction: u8 = None {
        None = 0,
        PerspectiveLinear = 2,
        PerspectiveExponential = 4,
        PerspectiveExponential2 = 5,
        PerspectiveReverseExponential = 6,
        PerspectiveReverseExponential2 = 7,
        OrthographicLinear = 10,
        OrthographicExponential = 12,
        OrthographicExponential2 = 13,
        OrthographicReverseExponential = 14,
        OrthographicReverseExponential2 = 15,
    }
}

gx_enum! {
    pub enum TextureFormat: u8 {
        I4 = 0,
        I8 = 1,
        IA4 = 2,
        IA8 = 3,
        RGB565 = 4,
        RGB5A3 = 5,
        RGBA8 = 6,
        CI4 = 8,
        CI8 = 9,
        CI14 = 10,
        CMPR = 14,
    }
}

gx_enum! {
    pub enum PaletteFormat: u8 {
        IA8 = 0,
        RGB565 = 1,
        RGB5A3 = 2,
    }
}

gx_enum! {
    pub enum WrapMode: u8 {
        Clamp = 0,
        Repeat = 1,
        Mirror = 2,
    }
}

gx_enum! {
    pub enum FilterMode: u8 {
        Nearest = 0,
        Linear = 1,
        NearestMipmapNearest = 2,
        LinearMipmapNearest = 3,
        NearestMipmapLinear = 4,
        LinearMipmapLinear = 5,
    }
}

gx_enum! {
    pub enum AnisotropyMax: u8 = One {
        One = 0,
        Two = 1,
        Four = 2,
    }
}

macro_rules! gx_defaults {
    ($($name:ident => $variant:ident,)*) => {
        $(impl Default for $name {
            fn default() -> $name { $name::$variant }
        })*
    };
}

gx_defaults! {
    Attribute => Null,
    InputType => None,
    PrimitiveType => Triangles,
    ChannelSource => Register,
    DiffuseFunction => None,
    AttenuationFunction => None,
    TexCoordFunction => Matrix2x4,
    TexCoordSource => Tex0,
    ChannelId => ColorZero,
    TevColorInput => Zero,
    TevAlphaInput => Zero,
    TevFunction => Add,
    TevBias => Zero,
    TevScale => One,
    TevRegister => Previous,
    ColorComponent => R,
    IndTexFormat => Bits8,
    IndTexBias => None,
    IndTexMatrix => Off,
    IndTexWrap => Off,
    IndTexAlphaSelection => Off,
    IndTexStageId => Stage0,
    IndTexScale => Scale1,
    CompareFunction => Always,
    AlphaOperator => And,
    BlendFunction => None,
    BlendSourceFactor => One,
    BlendDestinationFactor => Zero,
    LogicOperation => Copy,
    FogFunction => None,
    TextureFormat => I8,
    PaletteFormat => IA8,
    WrapMode => Repeat,
    FilterMode => Linear,
    AnisotropyMax => One,
    TexCoordId => TexCoord0,
    TexMapId => TexMap0,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{Pack, Unpack};

    #[test]
    fn strict_enum_rejects_unknown() {
        let buf = [0x42];
        assert!(PrimitiveType::unpack(&mut Cur::new(&buf)).is_err());
        let buf = [0x98];
        assert_eq!(PrimitiveType::unpack(&mut Cur::new(&buf)).unwrap(), PrimitiveType::TriangleStrip);
    }

    #[test]
    fn lenient_enum_falls_back() {
        let buf = [0x03];
        assert_eq!(FogFunction::unpack(&mut Cur::new(&buf)).unwrap(), FogFunction::None);
    }

    #[test]
    fn null_ids() {
        let buf = [0xFF, 0x02];
        let mut cur = Cur::new(&buf);
        assert_eq!(cur.next::<Option<TexMapId>>().unwrap(), None);
        assert_eq!(cur.next::<Option<TexMapId>>().unwrap(), Some(TexMapId::TexMap2));
        let mut out = Out::new();
        None::<ChannelId>.pack(&mut out).unwrap();
        assert_eq!(out.bytes(), &[0xFF]);
    }

    #[test]
    fn konst_registers() {
        assert_eq!(KColorSelection::K2.kcolor(), Some(2));
        assert_eq!(KColorSelection::K3G.kcolor(), Some(3));
        assert_eq!(KColorSelection::Half.kcolor(), None);
        assert_eq!(KAlphaSelection::K1A.kcolor(), Some(1));
    }

    #[test]
    fn attribute_helpers() {
        assert_eq!(Attribute::texcoord(3), Attribute::TexCoord3);
        assert_eq!(Attribute::tex_matrix_index(7), Attribute::Tex7MatrixIndex);
        assert!(Attribute::PositionMatrixIndex.is_matrix_index());
        assert!(!Attribute::Position.is_matrix_index());
    }
}
