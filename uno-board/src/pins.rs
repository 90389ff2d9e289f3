use crate::hal::port::PortExt;

avr_hal_generic::impl_board_pins! {
    #[port_defs]
    use crate::hal::port;

    /// Generic DDR that works for all ports
    pub struct DDR {
        portb: crate::pac::PORTB,
        portc: crate::pac::PORTC,
        portd: crate::pac::PORTD,
    }

    /// Pins of the Uno headers, named as printed next to them
    pub struct Pins {
        /// `A0`
        pub a0: portc::pc0::PC0,
        /// `A1`
        pub a1: portc::pc1::PC1,
        /// `A2`
        pub a2: portc::pc2::PC2,
        /// `A3`
        pub a3: portc::pc3::PC3,
        /// `A4`
        ///
        /// * SDA (2-wire serial bus data input/output line), taken by [`crate::twi::Twi`]
        pub a4: portc::pc4::PC4,
        /// `A5`
        ///
        /// * SCL (2-wire serial bus clock line), taken by [`crate::twi::Twi`]
        pub a5: portc::pc5::PC5,

        /// `D0` / `RX`
        pub d0: portd::pd0::PD0,
        /// `D1` / `TX`
        pub d1: portd::pd1::PD1,
        /// `D2`
        ///
        /// * INT0 (external interrupt 0)
        pub d2: portd::pd2::PD2,
        /// `D3`
        pub d3: portd::pd3::PD3,
        /// `D4`
        pub d4: portd::pd4::PD4,
        /// `D5`
        pub d5: portd::pd5::PD5,
        /// `D6`
        pub d6: portd::pd6::PD6,
        /// `D7`
        pub d7: portd::pd7::PD7,
        /// `D8`
        pub d8: portb::pb0::PB0,
        /// `D9`
        pub d9: portb::pb1::PB1,
        /// `D10`
        pub d10: portb::pb2::PB2,
        /// `D11`
        pub d11: portb::pb3::PB3,
        /// `D12`
        pub d12: portb::pb4::PB4,
        /// `D13`
        ///
        /// * onboard LED `L`
        pub d13: portb::pb5::PB5,
    }
}
